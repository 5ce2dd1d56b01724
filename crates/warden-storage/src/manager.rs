//! Registry of users currently held in memory.
//!
//! # Concurrency note
//!
//! Unlike most registries in this workspace the user manager IS shared
//! across threads: login tasks insert from off the main thread while the
//! main thread reads and unloads. A plain `Mutex<HashMap>` is enough, since
//! every critical section is a single map operation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use warden_protocol::PlayerId;

use crate::User;

#[derive(Debug, Default)]
pub struct UserManager {
    users: Mutex<HashMap<PlayerId, Arc<User>>>,
}

impl UserManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly loaded user, replacing any previous instance.
    pub fn insert(&self, user: Arc<User>) -> Option<Arc<User>> {
        self.lock().insert(user.id(), user)
    }

    pub fn get(&self, id: &PlayerId) -> Option<Arc<User>> {
        self.lock().get(id).cloned()
    }

    /// Finds a loaded user by name (case-insensitive).
    pub fn get_by_name(&self, name: &str) -> Option<Arc<User>> {
        self.lock()
            .values()
            .find(|u| u.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Removes a user from memory. Returns the user if one was loaded.
    pub fn unload(&self, id: &PlayerId) -> Option<Arc<User>> {
        self.lock().remove(id)
    }

    pub fn is_loaded(&self, id: &PlayerId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PlayerId, Arc<User>>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
