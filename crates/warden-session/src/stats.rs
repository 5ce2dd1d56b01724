//! Lifecycle counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, bumped by the coordinator and the login gate.
#[derive(Debug, Default)]
pub(crate) struct LoginStats {
    attached: AtomicU64,
    attach_failures: AtomicU64,
    detached: AtomicU64,
    teardowns: AtomicU64,
    cleanups_scheduled: AtomicU64,
    cleanups_cancelled: AtomicU64,
    invariant_violations: AtomicU64,
}

macro_rules! bump {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            pub(crate) fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl LoginStats {
    bump! {
        attached => attached,
        attach_failed => attach_failures,
        detached => detached,
        torn_down => teardowns,
        cleanup_scheduled => cleanups_scheduled,
        cleanup_cancelled => cleanups_cancelled,
        invariant_violated => invariant_violations,
    }

    pub(crate) fn snapshot(&self) -> LoginStatsSnapshot {
        LoginStatsSnapshot {
            attached: self.attached.load(Ordering::Relaxed),
            attach_failures: self.attach_failures.load(Ordering::Relaxed),
            detached: self.detached.load(Ordering::Relaxed),
            teardowns: self.teardowns.load(Ordering::Relaxed),
            cleanups_scheduled: self.cleanups_scheduled.load(Ordering::Relaxed),
            cleanups_cancelled: self.cleanups_cancelled.load(Ordering::Relaxed),
            invariant_violations: self.invariant_violations.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoginStatsSnapshot {
    /// Permission wrappers successfully installed.
    pub attached: u64,
    pub attach_failures: u64,
    /// Wrappers removed (quit or post-attach veto).
    pub detached: u64,
    /// Times a player's loaded data was actually released.
    pub teardowns: u64,
    pub cleanups_scheduled: u64,
    pub cleanups_cancelled: u64,
    pub invariant_violations: u64,
}
