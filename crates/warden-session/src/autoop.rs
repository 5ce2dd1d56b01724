//! Keeps a player's operator flag in step with a permission node.

use tracing::{info, warn};
use warden_protocol::Contexts;
use warden_storage::{DataStore, Storage};

use crate::{Connection, WardenConfig};

/// Auto-op synchronizer. Does nothing unless `auto_op` is enabled.
#[derive(Debug, Clone)]
pub struct AutoOp {
    enabled: bool,
    permission: String,
}

impl AutoOp {
    pub fn new(config: &WardenConfig) -> Self {
        Self {
            enabled: config.auto_op,
            permission: config.auto_op_permission.clone(),
        }
    }

    /// Sets the player's op flag to the value of the auto-op node in their
    /// current world. Leaves the flag alone if their data isn't loaded.
    pub fn refresh<S: Storage, C: Connection>(&self, store: &DataStore<S>, player: &C) {
        if !self.enabled {
            return;
        }

        let id = player.id();
        let Some(user) = store.get_loaded_user(&id) else {
            warn!(player_id = %id, "cannot refresh auto-op, user data is not loaded");
            return;
        };

        let contexts = Contexts::in_world(player.world());
        let should_be_op = user
            .permission_value(&self.permission, &contexts)
            .unwrap_or(false);

        if player.is_op() != should_be_op {
            player.set_op(should_be_op);
            info!(player_id = %id, op = should_be_op, %contexts, "auto-op changed operator status");
        }
    }
}
