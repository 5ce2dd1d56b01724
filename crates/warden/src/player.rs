//! Live player connections.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use warden_protocol::{Contexts, PlayerId};
use warden_session::{Connection, Permissible, SessionError};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A connected (or connecting) player.
///
/// Created by the server when a connection passes pre-login, and shared as
/// `Arc<Player>` between the main thread and whoever called
/// [`Server::connect`](crate::Server::connect).
pub struct Player {
    id: PlayerId,
    name: String,
    world: Mutex<String>,
    op: AtomicBool,
    /// The installed permission wrapper. `None` means the host default
    /// (nobody has anything).
    permissible: Mutex<Option<Permissible>>,
    /// Chat messages sent to this player, oldest first.
    inbox: Mutex<Vec<String>>,
    refuse_attach: AtomicBool,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, world: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            world: Mutex::new(world.into()),
            op: AtomicBool::new(false),
            permissible: Mutex::new(None),
            inbox: Mutex::new(Vec::new()),
            refuse_attach: AtomicBool::new(false),
        }
    }

    /// Checks a permission in the player's current world.
    pub fn has_permission(&self, permission: &str) -> bool {
        let contexts = Contexts::in_world(self.world());
        lock(&self.permissible)
            .as_ref()
            .is_some_and(|p| p.has_permission(permission, &contexts))
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.permissible).is_some()
    }

    pub fn send_message(&self, message: impl fmt::Display) {
        lock(&self.inbox).push(message.to_string());
    }

    /// Everything sent to this player so far.
    pub fn messages(&self) -> Vec<String> {
        lock(&self.inbox).clone()
    }

    pub fn last_message(&self) -> Option<String> {
        lock(&self.inbox).last().cloned()
    }

    /// Makes the next [`Connection::attach`] calls fail, as a host whose
    /// permission slot is sealed would.
    pub fn refuse_attach(&self, refuse: bool) {
        self.refuse_attach.store(refuse, Ordering::SeqCst);
    }

    /// Moves the player, returning the world they left.
    pub(crate) fn set_world(&self, world: impl Into<String>) -> String {
        std::mem::replace(&mut *lock(&self.world), world.into())
    }
}

impl Connection for Player {
    fn id(&self) -> PlayerId {
        self.id
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn world(&self) -> String {
        lock(&self.world).clone()
    }

    fn is_op(&self) -> bool {
        self.op.load(Ordering::SeqCst)
    }

    fn set_op(&self, op: bool) {
        self.op.store(op, Ordering::SeqCst);
    }

    fn attach(&self, permissible: Permissible) -> Result<(), SessionError> {
        if self.refuse_attach.load(Ordering::SeqCst) {
            return Err(SessionError::Attach(
                self.id,
                "permission slot is sealed".into(),
            ));
        }
        *lock(&self.permissible) = Some(permissible);
        Ok(())
    }

    fn detach(&self) -> Option<Permissible> {
        lock(&self.permissible).take()
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("world", &self.world())
            .field("op", &self.is_op())
            .field("attached", &self.is_attached())
            .finish()
    }
}
