//! The backend contract and the persisted user record.
//!
//! Warden doesn't persist anything itself. A backend (SQL, flat files, a
//! remote service) implements [`Storage`]; the rest of the stack only ever
//! sees [`UserRecord`]s coming in and going out.

use std::collections::BTreeSet;
use std::future::Future;

use serde::{Deserialize, Serialize};
use warden_protocol::PlayerId;

use crate::StorageError;

/// Name of the group every new user starts in.
pub const DEFAULT_GROUP: &str = "default";

/// A single permission assignment.
///
/// `world: None` applies everywhere; `Some(world)` only applies while the
/// player is in that world and overrides a global node with the same name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub permission: String,
    pub value: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world: Option<String>,
}

impl Node {
    /// A node that applies in every world.
    pub fn global(permission: impl Into<String>, value: bool) -> Self {
        Self {
            permission: permission.into(),
            value,
            world: None,
        }
    }

    /// A node that only applies in `world`.
    pub fn in_world(permission: impl Into<String>, value: bool, world: impl Into<String>) -> Self {
        Self {
            permission: permission.into(),
            value,
            world: Some(world.into()),
        }
    }
}

/// Everything the backend stores about a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: PlayerId,
    pub name: String,
    pub primary_group: String,
    pub groups: BTreeSet<String>,
    pub nodes: Vec<Node>,
}

impl UserRecord {
    /// The record a user gets the first time they're seen: member of the
    /// default group, no nodes of their own.
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            primary_group: DEFAULT_GROUP.to_string(),
            groups: BTreeSet::from([DEFAULT_GROUP.to_string()]),
            nodes: Vec::new(),
        }
    }
}

/// A persistence backend for user data.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` because one backend instance is shared by every
/// login task and by the main thread for the life of the server.
///
/// # Example
///
/// ```rust
/// use warden_protocol::PlayerId;
/// use warden_storage::{Storage, StorageError, UserRecord};
///
/// /// Every user is new, nothing is ever written.
/// struct Ephemeral;
///
/// impl Storage for Ephemeral {
///     fn is_accepting_logins(&self) -> bool {
///         true
///     }
///
///     async fn load_user(&self, id: PlayerId, name: &str) -> Result<UserRecord, StorageError> {
///         Ok(UserRecord::new(id, name))
///     }
///
///     async fn save_user(&self, _record: &UserRecord) -> Result<(), StorageError> {
///         Ok(())
///     }
/// }
/// ```
pub trait Storage: Send + Sync + 'static {
    /// Whether the backend is ready to serve logins. Checked before every
    /// admission; a `false` here keeps everybody out.
    fn is_accepting_logins(&self) -> bool;

    /// Loads (or creates) the record for a user.
    ///
    /// Called from the off-main login tasks, so it may take its time.
    fn load_user(
        &self,
        id: PlayerId,
        name: &str,
    ) -> impl Future<Output = Result<UserRecord, StorageError>> + Send;

    /// Persists a user's record.
    fn save_user(
        &self,
        record: &UserRecord,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}
