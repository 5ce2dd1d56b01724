//! Error types for the session layer.

use warden_protocol::{Phase, PlayerId};

/// Errors raised while admitting or tearing down a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Another observer re-allowed a player that Warden had already denied
    /// at this phase. That is a bug in the other observer: the player has
    /// no permission data, so the login is forced back to denied.
    #[error("player connection was re-allowed for {player_id} at the {phase} phase")]
    InvariantViolation { player_id: PlayerId, phase: Phase },

    /// The host refused the permission wrapper. The session continues
    /// without it.
    #[error("failed to attach permissions to {0}: {1}")]
    Attach(PlayerId, String),
}
