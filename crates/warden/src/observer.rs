//! Third-party event observers and the priority order they run in.
//!
//! For every event, observers run from [`EventPriority::Lowest`] to
//! [`EventPriority::Monitor`]. Within a priority they run in registration
//! order, and Warden's own observer for that slot always runs first:
//!
//! | slot | Warden | then |
//! |---|---|---|
//! | `Lowest` | recording pass | third-party `Lowest` observers |
//! | `Low` … `Highest` | | third-party observers |
//! | `Monitor` | monitor pass | third-party monitors (read-only) |
//!
//! Monitor observers are told the outcome, not asked for one: any change
//! they make to a login decision is reverted.
//!
//! Closures work as observers:
//!
//! ```rust
//! use warden::{EventPriority, ServerBuilder};
//! use warden::protocol::{AdmissionResult, PreLoginEvent};
//!
//! let builder = ServerBuilder::new().on_pre_login(
//!     EventPriority::Normal,
//!     |event: &mut PreLoginEvent| {
//!         if event.identity.name.starts_with("bot_") {
//!             event.decision.disallow(AdmissionResult::KickOther, "No bots");
//!         }
//!     },
//! );
//! # drop(builder);
//! ```

use warden_protocol::{CommandEvent, LoginEvent, PreLoginEvent, QuitEvent};

use crate::Player;

/// When an observer runs relative to others for the same event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventPriority {
    Lowest,
    Low,
    Normal,
    High,
    Highest,
    /// Runs last. Observes the final outcome and must not change it.
    Monitor,
}

/// Observes the early, off-main admission check.
///
/// Runs on the connecting player's task, concurrently with other
/// connections.
pub trait PreLoginObserver: Send + Sync + 'static {
    fn on_pre_login(&self, event: &mut PreLoginEvent);
}

/// Observes the late admission check on the main thread.
pub trait LoginObserver: Send + Sync + 'static {
    fn on_login(&self, event: &mut LoginEvent<Player>);
}

/// Observes a quit on the main thread. The player's permissions are still
/// attached while this runs.
pub trait QuitObserver: Send + Sync + 'static {
    fn on_quit(&self, event: &QuitEvent<Player>);
}

/// Observes a command before it runs; may cancel it.
pub trait CommandObserver: Send + Sync + 'static {
    fn on_command(&self, event: &mut CommandEvent<Player>);
}

impl<F> PreLoginObserver for F
where
    F: Fn(&mut PreLoginEvent) + Send + Sync + 'static,
{
    fn on_pre_login(&self, event: &mut PreLoginEvent) {
        self(event)
    }
}

impl<F> LoginObserver for F
where
    F: Fn(&mut LoginEvent<Player>) + Send + Sync + 'static,
{
    fn on_login(&self, event: &mut LoginEvent<Player>) {
        self(event)
    }
}

impl<F> QuitObserver for F
where
    F: Fn(&QuitEvent<Player>) + Send + Sync + 'static,
{
    fn on_quit(&self, event: &QuitEvent<Player>) {
        self(event)
    }
}

impl<F> CommandObserver for F
where
    F: Fn(&mut CommandEvent<Player>) + Send + Sync + 'static,
{
    fn on_command(&self, event: &mut CommandEvent<Player>) {
        self(event)
    }
}

/// Observers of one event type, kept sorted by priority.
pub(crate) struct Registry<T: ?Sized> {
    entries: Vec<(EventPriority, Box<T>)>,
}

impl<T: ?Sized> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub(crate) fn register(&mut self, priority: EventPriority, observer: Box<T>) {
        // After every entry of the same priority: registration order holds.
        let at = self.entries.partition_point(|(p, _)| *p <= priority);
        self.entries.insert(at, (priority, observer));
    }

    /// Everything below `Monitor`, in run order.
    pub(crate) fn deciders(&self) -> impl Iterator<Item = &T> {
        self.entries
            .iter()
            .filter(|(p, _)| *p < EventPriority::Monitor)
            .map(|(_, o)| o.as_ref())
    }

    pub(crate) fn monitors(&self) -> impl Iterator<Item = &T> {
        self.entries
            .iter()
            .filter(|(p, _)| *p == EventPriority::Monitor)
            .map(|(_, o)| o.as_ref())
    }

    /// Every observer, monitors included, in run order.
    pub(crate) fn all(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, o)| o.as_ref())
    }
}

/// Observers registered through the builder, grouped by event.
pub(crate) struct Observers {
    pub(crate) pre_login: Registry<dyn PreLoginObserver>,
    pub(crate) login: Registry<dyn LoginObserver>,
    pub(crate) quit: Registry<dyn QuitObserver>,
    pub(crate) command: Registry<dyn CommandObserver>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self {
            pre_login: Registry::new(),
            login: Registry::new(),
            quit: Registry::new(),
            command: Registry::new(),
        }
    }
}
