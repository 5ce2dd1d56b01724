//! # warden-session
//!
//! Decides whether each connecting player gets in, makes sure their
//! permission data is loaded before they're fully admitted, and makes sure
//! it's released exactly once however they leave.
//!
//! ## How admission works
//!
//! The host announces a connection in two phases:
//!
//! 1. **Pre-login**, off the main thread, possibly many at once. Warden
//!    loads the player's data here ([`LoginCoordinator`]).
//! 2. **Login**, on the main thread. Warden attaches a [`Permissible`]
//!    wrapper to the connection here ([`LoginGate`]).
//!
//! Each phase is observed twice: once at the lowest priority (Warden
//! decides) and once at the highest (Warden checks what every other
//! observer did to its decision). The `denial` trackers link the two
//! passes.
//!
//! A player leaves by quitting (explicit teardown) or by having their
//! login denied after their data was loaded (inferred teardown, handled
//! through the cancellable [`CleanupScheduler`]).
//!
//! ## Host seam
//!
//! The host implements [`Connection`] for its players and [`Scheduler`]
//! for its main thread. Nothing else in this crate knows about the host.

mod autoop;
mod cleanup;
mod config;
mod coordinator;
mod denial;
mod error;
mod gate;
mod host;
mod permissible;
mod stats;

pub use autoop::AutoOp;
pub use cleanup::CleanupScheduler;
pub use config::{DEFAULT_AUTO_OP_PERMISSION, MAX_CLEANUP_DELAY_TICKS, WardenConfig};
pub use coordinator::LoginCoordinator;
pub use denial::{AsyncDenials, SyncDenial, SyncDenials};
pub use error::SessionError;
pub use gate::LoginGate;
pub use host::{Connection, Scheduler, Task, TaskHandle};
pub use permissible::Permissible;
pub use stats::LoginStatsSnapshot;
