//! Main-thread timekeeping for Warden.
//!
//! The host server serializes all permission-affecting work on one "main
//! thread". This crate gives that thread a heartbeat and a to-do list:
//!
//! - [`TickClock`]: fixed-rate ticks (20 Hz by default) with budget
//!   warnings and skip-ahead on overrun
//! - [`TaskQueue`]: tasks scheduled N ticks ahead from any thread, run by
//!   the main thread when due, cancellable through a [`TaskHandle`]
//!
//! # Integration
//!
//! Both sit inside the main thread's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = rx.recv() => { /* handle commands */ }
//!         tick = clock.wait_for_tick() => {
//!             for task in queue.take_due(tick) {
//!                 task();
//!             }
//!             clock.record_tick_end();
//!         }
//!     }
//! }
//! ```

mod clock;
mod queue;

pub use clock::{ClockConfig, TickClock};
pub use queue::{Task, TaskHandle, TaskQueue};
