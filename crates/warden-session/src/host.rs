//! What Warden needs from the host server.
//!
//! The host owns the connections and the main thread; Warden only reaches
//! them through these two traits. Keeping the seam this narrow means the
//! coordinator can be driven by the real server, by the test harness, or by
//! a hand-written mock with no changes.

use warden_protocol::PlayerId;

use crate::{Permissible, SessionError};

/// A unit of work handed to the host's scheduler.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A live player connection.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` because the same connection is referenced from
/// the main thread, from background pre-computation, and from wherever the
/// host keeps its player list.
pub trait Connection: Send + Sync + 'static {
    fn id(&self) -> PlayerId;

    fn name(&self) -> String;

    /// The world the player is currently in.
    fn world(&self) -> String;

    fn is_op(&self) -> bool;

    fn set_op(&self, op: bool);

    /// Installs Warden's permission wrapper, replacing the host default.
    ///
    /// # Errors
    /// [`SessionError::Attach`] if the host can't take the wrapper. Warden
    /// logs this and lets the session continue.
    fn attach(&self, permissible: Permissible) -> Result<(), SessionError>;

    /// Removes the wrapper and restores the host default. Returns the
    /// removed wrapper, or `None` if none was attached.
    fn detach(&self) -> Option<Permissible>;
}

/// Cancels one scheduled task.
pub trait TaskHandle: Send + Sync + 'static {
    /// Cancels the task. Must be a harmless no-op if it already ran.
    fn cancel(&self);
}

/// The host's task scheduler.
pub trait Scheduler: Send + Sync + 'static {
    type Handle: TaskHandle;

    /// Runs `task` on the main thread `delay_ticks` ticks from now
    /// (0 = next tick).
    ///
    /// Must never run the task inline: callers hold locks while scheduling.
    fn run_later(&self, delay_ticks: u64, task: Task) -> Self::Handle;

    /// Runs `task` off the main thread, as soon as possible.
    fn run_async(&self, task: Task);
}
