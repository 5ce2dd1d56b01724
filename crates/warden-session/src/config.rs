//! Settings that shape the admission lifecycle.

use serde::{Deserialize, Serialize};
use tracing::warn;
use warden_protocol::Contexts;

/// Permission node consulted by the auto-op synchronizer unless configured
/// otherwise.
pub const DEFAULT_AUTO_OP_PERMISSION: &str = "warden.autoop";

/// Longest allowed deferred-cleanup delay: one hour at 20 Hz.
pub const MAX_CLEANUP_DELAY_TICKS: u64 = 20 * 60 * 60;

/// Configuration for the login coordinator.
///
/// Every field has a default, so a config file only needs to mention what
/// it changes (`#[serde(default)]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Keep each player's operator flag equal to the value of
    /// [`Self::auto_op_permission`]. Also clears the flag when they quit.
    pub auto_op: bool,

    /// The node that decides the operator flag when `auto_op` is on.
    pub auto_op_permission: String,

    /// How many ticks an inferred departure waits before the player's data
    /// is released. A reconnect within this window cancels the release.
    pub cleanup_delay_ticks: u64,

    /// Extra world whose permissions are pre-computed for operators when
    /// they log in. The global context is always pre-computed.
    pub elevated_world: Option<String>,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            auto_op: false,
            auto_op_permission: DEFAULT_AUTO_OP_PERMISSION.to_string(),
            // 3 seconds on a 20 Hz main thread.
            cleanup_delay_ticks: 60,
            elevated_world: None,
        }
    }
}

impl WardenConfig {
    /// Fix values that would make the coordinator misbehave.
    ///
    /// - an empty `auto_op_permission` falls back to the default node
    /// - an empty `elevated_world` is treated as unset
    /// - `cleanup_delay_ticks` is capped at [`MAX_CLEANUP_DELAY_TICKS`]
    pub fn validated(mut self) -> Self {
        if self.auto_op_permission.trim().is_empty() {
            warn!(
                default = DEFAULT_AUTO_OP_PERMISSION,
                "auto_op_permission is empty, using default"
            );
            self.auto_op_permission = DEFAULT_AUTO_OP_PERMISSION.to_string();
        }
        if self
            .elevated_world
            .as_deref()
            .is_some_and(|w| w.trim().is_empty())
        {
            self.elevated_world = None;
        }
        if self.cleanup_delay_ticks > MAX_CLEANUP_DELAY_TICKS {
            warn!(
                requested = self.cleanup_delay_ticks,
                using = MAX_CLEANUP_DELAY_TICKS,
                "cleanup_delay_ticks too large"
            );
            self.cleanup_delay_ticks = MAX_CLEANUP_DELAY_TICKS;
        }
        self
    }

    /// The context set pre-computed for operators at login.
    pub fn elevated_contexts(&self) -> Vec<Contexts> {
        let mut contexts = vec![Contexts::global()];
        if let Some(world) = &self.elevated_world {
            contexts.push(Contexts::in_world(world.clone()));
        }
        contexts
    }
}
