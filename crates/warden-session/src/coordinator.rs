//! The pre-login half of the admission lifecycle, plus the teardown and
//! cleanup machinery both phases share.
//!
//! Pre-login runs off the main thread, possibly for many connections at
//! once, so [`LoginCoordinator`] is `Sync` and is shared through an `Arc`.
//! The main-thread half lives in [`LoginGate`](crate::LoginGate), which
//! holds an `Arc` to the coordinator.
//!
//! # Pre-login
//!
//! ```text
//!  on_pre_login (record)                     on_pre_login_monitor
//!  ─────────────────────                     ────────────────────
//!  already denied? ── yes ─→ mark            marked? ── re-allowed → force deny + Err
//!        │ no                                   │ no       still denied → Ok
//!  store not ready? ─ yes ─→ mark + deny        ▼
//!        │ no                                denied by someone else? ── yes → release data now
//!  cancel pending cleanup                       │ no
//!  load user data (failure only logged)         ▼ Ok
//! ```

use std::sync::{Arc, Weak};

use tracing::{debug, error, info, trace, warn};
use warden_protocol::{AdmissionResult, Decision, Message, Phase, PlayerId, PreLoginEvent};
use warden_storage::{DataStore, Storage};

use crate::autoop::AutoOp;
use crate::cleanup::CleanupScheduler;
use crate::denial::AsyncDenials;
use crate::stats::{LoginStats, LoginStatsSnapshot};
use crate::{Connection, Scheduler, SessionError, WardenConfig};

/// Owns Warden's side of pre-login and the release of player data.
pub struct LoginCoordinator<St: Storage, Sc: Scheduler> {
    store: Arc<DataStore<St>>,
    scheduler: Sc,
    config: WardenConfig,
    auto_op: AutoOp,
    denied_async: AsyncDenials,
    cleanup: CleanupScheduler<Sc::Handle>,
    pub(crate) stats: LoginStats,
}

impl<St: Storage, Sc: Scheduler> LoginCoordinator<St, Sc> {
    pub fn new(store: Arc<DataStore<St>>, scheduler: Sc, config: WardenConfig) -> Self {
        let config = config.validated();
        Self {
            store,
            scheduler,
            auto_op: AutoOp::new(&config),
            config,
            denied_async: AsyncDenials::new(),
            cleanup: CleanupScheduler::new(),
            stats: LoginStats::default(),
        }
    }

    pub fn store(&self) -> &Arc<DataStore<St>> {
        &self.store
    }

    pub fn scheduler(&self) -> &Sc {
        &self.scheduler
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    pub fn stats(&self) -> LoginStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn has_pending_cleanup(&self, id: &PlayerId) -> bool {
        self.cleanup.is_pending(id)
    }

    /// `true` while a pre-login denial is waiting for its monitor pass.
    pub fn is_marked_denied(&self, id: &PlayerId) -> bool {
        self.denied_async.contains(id)
    }

    /// Pre-login recording pass. Runs at the lowest priority, before any
    /// third-party observer, on a background worker.
    ///
    /// Loads the player's data when the connection may proceed. A load
    /// failure is logged but does not deny here: the login phase denies
    /// anyone whose data isn't loaded.
    pub async fn on_pre_login(&self, event: &mut PreLoginEvent) {
        let id = event.id();

        if !event.decision.is_allowed() {
            // Already refused by the host. Remember it so the monitor
            // doesn't mistake this for someone else's denial.
            self.denied_async.record(id);
            debug!(
                player_id = %id,
                result = %event.decision.result(),
                "pre-login already denied, not loading data"
            );
            return;
        }

        if !self.store.is_accepting_logins() {
            self.denied_async.record(id);
            warn!(
                player_id = %id,
                name = %event.identity.name,
                "permission storage is not ready, denying connection"
            );
            event
                .decision
                .disallow(AdmissionResult::KickOther, Message::LoadingError.to_string());
            return;
        }

        if self.cancel_cleanup(&id) {
            debug!(player_id = %id, "player reconnected, cancelled pending data release");
        }

        match self.store.load_user(id, &event.identity.name).await {
            Ok(user) => {
                debug!(player_id = %id, primary_group = %user.primary_group(), "loaded user data");
            }
            Err(e) => {
                warn!(
                    player_id = %id,
                    name = %event.identity.name,
                    error = %e,
                    "failed to load user data, login will be denied"
                );
            }
        }
    }

    /// Pre-login monitor pass. Runs at the highest priority, after every
    /// other observer.
    ///
    /// # Errors
    /// [`SessionError::InvariantViolation`] if a player Warden denied was
    /// re-allowed. The decision is forced back to denied before returning.
    pub fn on_pre_login_monitor(&self, event: &mut PreLoginEvent) -> Result<(), SessionError> {
        let id = event.id();

        if self.denied_async.consume(&id) {
            if event.decision.is_allowed() {
                return Err(self.violation(id, Phase::PreLogin, &mut event.decision));
            }
            return Ok(());
        }

        if event.decision.is_allowed() {
            return Ok(());
        }

        // Someone after us denied the connection. Our data is loaded, the
        // login phase will never run for it and no quit will arrive.
        debug!(
            player_id = %id,
            result = %event.decision.result(),
            "pre-login denied by another observer, releasing user data"
        );
        self.on_leave(id);
        Ok(())
    }

    /// Releases a departing player's data. Idempotent: returns `false` if
    /// nothing was loaded.
    pub fn on_leave(&self, id: PlayerId) -> bool {
        match self.store.unload_user(&id) {
            Some(user) => {
                user.invalidate_caches();
                self.stats.torn_down();
                info!(player_id = %id, name = %user.name(), "released user data");
                true
            }
            None => {
                trace!(player_id = %id, "no user data to release");
                false
            }
        }
    }

    /// Re-evaluates the auto-op node for a player and updates their op
    /// flag. No-op when auto-op is disabled.
    pub fn refresh_auto_op<C: Connection>(&self, player: &C) {
        self.auto_op.refresh(&self.store, player);
    }

    /// Schedules [`Self::on_leave`] for `id` on the main thread after
    /// `delay_ticks`. Returns `false` if a release is already pending.
    ///
    /// The task holds only a weak reference, so a pending release never
    /// keeps a shut-down coordinator alive.
    pub fn schedule_cleanup(self: &Arc<Self>, id: PlayerId, delay_ticks: u64) -> bool {
        let coordinator: Weak<Self> = Arc::downgrade(self);
        let scheduled = self
            .cleanup
            .schedule(&self.scheduler, id, delay_ticks, move |id| {
                if let Some(coordinator) = coordinator.upgrade() {
                    coordinator.on_leave(id);
                }
            });
        if scheduled {
            self.stats.cleanup_scheduled();
            debug!(player_id = %id, delay_ticks, "scheduled release of user data");
        }
        scheduled
    }

    /// Cancels a pending release. Returns `true` if one was pending.
    pub fn cancel_cleanup(&self, id: &PlayerId) -> bool {
        let cancelled = self.cleanup.cancel(id);
        if cancelled {
            self.stats.cleanup_cancelled();
        }
        cancelled
    }

    /// Records and logs a re-allowed denial, forcing the decision back.
    pub(crate) fn violation(
        &self,
        id: PlayerId,
        phase: Phase,
        decision: &mut Decision,
    ) -> SessionError {
        self.stats.invariant_violated();
        decision.disallow(AdmissionResult::KickOther, Message::LoadingError.to_string());
        error!(
            player_id = %id,
            %phase,
            "player connection was re-allowed after being denied; another observer is overriding the decision"
        );
        SessionError::InvariantViolation {
            player_id: id,
            phase,
        }
    }
}
