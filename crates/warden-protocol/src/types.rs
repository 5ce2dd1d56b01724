//! Core identity and context types shared by every Warden crate.
//!
//! Nothing in here knows about storage, scheduling, or the host server.
//! These are the nouns the rest of the stack talks in: WHO is connecting
//! ([`PlayerId`], [`Identity`]), WHERE they are ([`Contexts`]), and WHAT the
//! admission checks decided ([`AdmissionResult`], [`Phase`]).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable unique identifier for a player.
///
/// Newtype wrapper around a [`Uuid`] so a player key can't be confused with
/// any other UUID floating around the server (world IDs, request IDs, ...).
/// It's `Copy` because a UUID is just 16 bytes.
///
/// `#[serde(transparent)]` serializes this as the bare UUID string instead
/// of `{ "0": "..." }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Generates a fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the wrapped UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for PlayerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Prints the hyphenated UUID, e.g. `67e55044-10b1-426f-9247-bb680e5fe0c8`.
impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// A connecting player: the stable key plus the name they connected with.
///
/// The name is for logs and messages only. All lifecycle state is keyed
/// by [`PlayerId`] because names can change between logins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub id: PlayerId,
    pub name: String,
}

impl Identity {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.id, self.name)
    }
}

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

/// The context a permission is evaluated in.
///
/// Today the only dimension is the world a player stands in. `None` means
/// the global context: only nodes without a world restriction apply.
///
/// `Hash + Eq` so a `Contexts` can key the per-user permission cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Contexts {
    pub world: Option<String>,
}

impl Contexts {
    /// The global context (no world).
    pub fn global() -> Self {
        Self { world: None }
    }

    /// The context of a specific world.
    pub fn in_world(world: impl Into<String>) -> Self {
        Self {
            world: Some(world.into()),
        }
    }
}

impl fmt::Display for Contexts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.world {
            Some(world) => write!(f, "world={world}"),
            None => write!(f, "global"),
        }
    }
}

// ---------------------------------------------------------------------------
// Admission results
// ---------------------------------------------------------------------------

/// The outcome of an admission check, as seen by every observer.
///
/// Both the early (pre-login) and the late (login) checks use the same set
/// of outcomes. Only [`AdmissionResult::Allowed`] lets a player through;
/// every other variant is a reason for kicking them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionResult {
    #[default]
    Allowed,
    KickFull,
    KickBanned,
    KickWhitelist,
    KickOther,
}

impl AdmissionResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

impl fmt::Display for AdmissionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Allowed => "allowed",
            Self::KickFull => "kick_full",
            Self::KickBanned => "kick_banned",
            Self::KickWhitelist => "kick_whitelist",
            Self::KickOther => "kick_other",
        };
        f.write_str(s)
    }
}

/// Which admission checkpoint something happened at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// The early check, run off the main thread before the player exists.
    PreLogin,
    /// The late check, run on the main thread with a live connection.
    Login,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreLogin => f.write_str("pre"),
            Self::Login => f.write_str("sync"),
        }
    }
}
