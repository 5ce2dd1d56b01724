//! Host events that flow through the admission pipeline.
//!
//! Every event here is handed, in priority order, to every observer that
//! registered for it. Observers may flip the admission result of the two
//! login events at will, which is exactly why Warden needs a separate
//! monitor stage to find out what the final decision was.
//!
//! The connection-carrying events are generic over `P`, the host's player
//! type. This crate doesn't care what a player is; it only moves the
//! `Arc<P>` around.

use std::sync::Arc;

use crate::{AdmissionResult, Identity, PlayerId};

/// A mutable admission verdict: the result plus the kick message shown to
/// the player when the result is not [`AdmissionResult::Allowed`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision {
    result: AdmissionResult,
    kick_message: String,
}

impl Decision {
    /// A decision that currently lets the player through.
    pub fn allowed() -> Self {
        Self::default()
    }

    /// A decision that starts out denied (the host's own check failed).
    pub fn denied(result: AdmissionResult, message: impl Into<String>) -> Self {
        Self {
            result,
            kick_message: message.into(),
        }
    }

    pub fn result(&self) -> AdmissionResult {
        self.result
    }

    pub fn kick_message(&self) -> &str {
        &self.kick_message
    }

    pub fn is_allowed(&self) -> bool {
        self.result.is_allowed()
    }

    /// Denies the player with the given reason and message.
    pub fn disallow(&mut self, result: AdmissionResult, message: impl Into<String>) {
        self.result = result;
        self.kick_message = message.into();
    }

    /// Lets the player through again, clearing the kick message.
    pub fn allow(&mut self) {
        self.result = AdmissionResult::Allowed;
        self.kick_message.clear();
    }
}

/// The early, off-main-thread admission check.
///
/// Fired before the player object exists, so all it carries is the
/// identity and the verdict.
#[derive(Debug, Clone)]
pub struct PreLoginEvent {
    pub identity: Identity,
    pub decision: Decision,
}

impl PreLoginEvent {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            decision: Decision::allowed(),
        }
    }

    pub fn id(&self) -> PlayerId {
        self.identity.id
    }
}

/// The late, main-thread admission check. The player object exists now,
/// but still isn't "online" until every observer had its say.
#[derive(Debug)]
pub struct LoginEvent<P> {
    pub player: Arc<P>,
    pub decision: Decision,
}

impl<P> LoginEvent<P> {
    pub fn new(player: Arc<P>) -> Self {
        Self {
            player,
            decision: Decision::allowed(),
        }
    }
}

/// An online player is leaving (explicit disconnect or kick).
#[derive(Debug)]
pub struct QuitEvent<P> {
    pub player: Arc<P>,
}

/// An online player moved from one world to another.
#[derive(Debug)]
pub struct WorldChangeEvent<P> {
    pub player: Arc<P>,
    pub from: String,
}

/// A player typed a command. Observers may cancel it before it runs.
#[derive(Debug)]
pub struct CommandEvent<P> {
    pub player: Arc<P>,
    pub message: String,
    pub cancelled: bool,
}

impl<P> CommandEvent<P> {
    pub fn new(player: Arc<P>, message: impl Into<String>) -> Self {
        Self {
            player,
            message: message.into(),
            cancelled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_disallow_then_allow_clears_message() {
        let mut decision = Decision::allowed();
        decision.disallow(AdmissionResult::KickOther, "go away");
        assert!(!decision.is_allowed());
        assert_eq!(decision.kick_message(), "go away");

        decision.allow();
        assert!(decision.is_allowed());
        assert_eq!(decision.kick_message(), "");
    }

    #[test]
    fn test_decision_denied_starts_denied() {
        let decision = Decision::denied(AdmissionResult::KickBanned, "banned");
        assert_eq!(decision.result(), AdmissionResult::KickBanned);
        assert!(!decision.is_allowed());
    }

    #[test]
    fn test_pre_login_event_starts_allowed() {
        let event = PreLoginEvent::new(Identity::new(PlayerId::random(), "jeb_"));
        assert!(event.decision.is_allowed());
    }

    #[test]
    fn test_command_event_starts_uncancelled() {
        let event = CommandEvent::new(Arc::new(()), "/op jeb_");
        assert!(!event.cancelled);
        assert_eq!(event.message, "/op jeb_");
    }
}
