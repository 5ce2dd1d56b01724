//! The permission-bearing wrapper injected into a live connection.

use std::sync::Arc;

use warden_protocol::{Contexts, PlayerId};
use warden_storage::{PermissionSnapshot, User};

/// Answers permission checks for one connected player from their loaded
/// [`User`] data.
///
/// Cloning is cheap (an `Arc` bump). The host keeps one clone in the
/// connection; Warden never holds on to another.
#[derive(Debug, Clone)]
pub struct Permissible {
    user: Arc<User>,
}

impl Permissible {
    pub fn new(user: Arc<User>) -> Self {
        Self { user }
    }

    pub fn player_id(&self) -> PlayerId {
        self.user.id()
    }

    pub fn user(&self) -> &Arc<User> {
        &self.user
    }

    /// `true` only if the node resolves to granted. Unset means denied.
    pub fn has_permission(&self, permission: &str, contexts: &Contexts) -> bool {
        self.user
            .permission_value(permission, contexts)
            .unwrap_or(false)
    }

    /// `true` if the node is explicitly set (either way) in this context.
    pub fn is_permission_set(&self, permission: &str, contexts: &Contexts) -> bool {
        self.user.permission_value(permission, contexts).is_some()
    }

    pub fn snapshot(&self, contexts: &Contexts) -> Arc<PermissionSnapshot> {
        self.user.snapshot(contexts)
    }
}
