//! Server configuration.
//!
//! Loaded from JSON. Everything has a default, so `{}` is a valid config.
//!
//! ```json
//! {
//!   "tick_rate_hz": 20,
//!   "max_players": 50,
//!   "ops_enabled": false,
//!   "groups": ["default", "admin"],
//!   "warden": { "auto_op": true, "cleanup_delay_ticks": 100 }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;
use warden_session::WardenConfig;
use warden_storage::DEFAULT_GROUP;
use warden_tick::ClockConfig;

use crate::ServerError;

/// Host-side settings plus the embedded [`WardenConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Main-thread tick rate.
    pub tick_rate_hz: u32,

    /// Logins beyond this are denied by the host with `kick_full`.
    pub max_players: usize,

    /// When false, the vanilla `op`/`deop` commands are blocked.
    pub ops_enabled: bool,

    /// World new players spawn into.
    pub default_world: String,

    /// Groups that exist at startup. The default group always exists.
    pub groups: Vec<String>,

    pub warden: WardenConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20,
            max_players: 20,
            ops_enabled: true,
            default_world: "world".to_string(),
            groups: vec![DEFAULT_GROUP.to_string()],
            warden: WardenConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Parses a config from JSON.
    ///
    /// # Errors
    /// [`ServerError::Config`] if the JSON is malformed or a field has the
    /// wrong type.
    pub fn from_json_str(json: &str) -> Result<Self, ServerError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ServerError::Config(e.to_string()))?;
        Ok(config.validated())
    }

    /// Reads and parses a JSON config file.
    ///
    /// # Errors
    /// [`ServerError::Config`] if the file can't be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Clamps nonsensical values, logging each fix.
    pub fn validated(mut self) -> Self {
        let clock = ClockConfig::with_rate(self.tick_rate_hz).validated();
        if clock.tick_rate_hz != self.tick_rate_hz {
            warn!(
                requested = self.tick_rate_hz,
                using = clock.tick_rate_hz,
                "tick_rate_hz out of range"
            );
            self.tick_rate_hz = clock.tick_rate_hz;
        }
        if self.default_world.trim().is_empty() {
            warn!("default_world is empty, using \"world\"");
            self.default_world = "world".to_string();
        }
        if !self
            .groups
            .iter()
            .any(|g| g.eq_ignore_ascii_case(DEFAULT_GROUP))
        {
            self.groups.push(DEFAULT_GROUP.to_string());
        }
        self.warden = self.warden.validated();
        self
    }

    pub(crate) fn clock(&self) -> ClockConfig {
        ClockConfig::with_rate(self.tick_rate_hz).validated()
    }
}
