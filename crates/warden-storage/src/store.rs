//! The data store gateway: one handle over the backend, the loaded-user
//! registry, and the set of known groups.
//!
//! The session layer only ever talks to [`DataStore`]. It asks three things:
//! is the backend ready, load this user, and is this user loaded.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use warden_protocol::PlayerId;

use crate::{DEFAULT_GROUP, Storage, StorageError, User, UserManager};

pub struct DataStore<S: Storage> {
    storage: S,
    users: UserManager,
    groups: Mutex<BTreeSet<String>>,
}

impl<S: Storage> DataStore<S> {
    /// Wraps a backend. The default group always exists.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            users: UserManager::new(),
            groups: Mutex::new(BTreeSet::from([DEFAULT_GROUP.to_string()])),
        }
    }

    /// Direct access to the backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn users(&self) -> &UserManager {
        &self.users
    }

    pub fn is_accepting_logins(&self) -> bool {
        self.storage.is_accepting_logins()
    }

    /// Loads a user from the backend and registers them as loaded.
    ///
    /// A user that is already loaded gets replaced by the fresh copy, so a
    /// reconnect always starts from what the backend has.
    ///
    /// # Errors
    /// - [`StorageError::NotReady`] if the backend isn't accepting logins
    /// - whatever the backend's `load_user` reports
    pub async fn load_user(&self, id: PlayerId, name: &str) -> Result<Arc<User>, StorageError> {
        if !self.is_accepting_logins() {
            return Err(StorageError::NotReady);
        }
        let record = self.storage.load_user(id, name).await?;
        let user = Arc::new(User::from_record(record));
        if self.users.insert(Arc::clone(&user)).is_some() {
            tracing::debug!(player_id = %id, "replaced previously loaded user data");
        }
        tracing::debug!(player_id = %id, %name, "user data loaded");
        Ok(user)
    }

    pub fn get_loaded_user(&self, id: &PlayerId) -> Option<Arc<User>> {
        self.users.get(id)
    }

    /// Removes a user from memory. Idempotent.
    pub fn unload_user(&self, id: &PlayerId) -> Option<Arc<User>> {
        self.users.unload(id)
    }

    /// Persists a loaded user's current data.
    pub async fn save_user(&self, user: &User) -> Result<(), StorageError> {
        self.storage.save_user(&user.to_record()).await
    }

    /// Registers a group name (stored lowercase).
    pub fn create_group(&self, name: &str) -> bool {
        self.groups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_lowercase())
    }

    pub fn group_exists(&self, name: &str) -> bool {
        self.groups
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&name.to_lowercase())
    }
}
