//! Per-phase "we denied this player" trackers.
//!
//! Each admission phase runs in two passes: a recording pass where Warden
//! makes its own decision, and a monitor pass (at the highest priority,
//! after every other observer) where it inspects the final outcome. The
//! trackers carry the recording pass's denial forward to the monitor pass.
//!
//! ```text
//!  record pass                           monitor pass
//!  ───────────                           ────────────
//!  denied (by host or by us) ──record──→ consume ──┬─ still denied: fine
//!                                                  └─ re-allowed: violation
//! ```
//!
//! The two phases have different threading, so the trackers differ:
//!
//! - [`AsyncDenials`] is shared by every pre-login worker, so it's a
//!   mutex-guarded set.
//! - [`SyncDenials`] is only touched from the main thread. It's a plain
//!   map behind `&mut self`; the borrow checker rules out re-entry.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use warden_protocol::PlayerId;

/// Identifiers denied in the pre-login recording pass and not yet seen by
/// the pre-login monitor.
#[derive(Debug, Default)]
pub struct AsyncDenials {
    denied: Mutex<HashSet<PlayerId>>,
}

impl AsyncDenials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, id: PlayerId) {
        self.denied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
    }

    /// Removes the marker. Returns `true` if one was present.
    pub fn consume(&self, id: &PlayerId) -> bool {
        self.denied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.denied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    pub fn len(&self) -> usize {
        self.denied
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Why the login recording pass marked a player as denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDenial {
    /// The login was already denied when Warden saw it (full server,
    /// whitelist, a third-party observer at a lower priority).
    /// Warden's data may still be loaded from pre-login.
    Host,

    /// Warden denied it itself because no data was loaded.
    NotLoaded,
}

/// Players denied in the login recording pass, keyed by id. Main thread
/// only.
#[derive(Debug, Default)]
pub struct SyncDenials {
    denied: HashMap<PlayerId, SyncDenial>,
}

impl SyncDenials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: PlayerId, reason: SyncDenial) {
        self.denied.insert(id, reason);
    }

    pub fn consume(&mut self, id: &PlayerId) -> Option<SyncDenial> {
        self.denied.remove(id)
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.denied.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.denied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.denied.is_empty()
    }
}
