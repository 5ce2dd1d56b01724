//! The main-thread half of the admission lifecycle.
//!
//! Every method here takes `&mut self` and is meant to be called from the
//! host's main thread only. The host owns the gate outright (no lock), the
//! same way a room actor owns its room.
//!
//! # Login
//!
//! ```text
//!  on_login (record)                          on_login_monitor
//!  ─────────────────                          ────────────────
//!  already denied? ── yes ─→ mark(Host)       marked? ── Host + data loaded → deferred release
//!        │ no                                    │         then re-allowed → force deny + Err
//!  data not loaded? ─ yes ─→ mark(NotLoaded)     │         else Ok
//!        │ no                 + deny             │ no
//!  cancel pending cleanup                        ▼
//!  attach wrapper                             vetoed after attach? ── yes → detach + release now
//!  auto-op; pre-warm for ops                     │ no
//!                                                ▼ auto-op
//! ```

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use warden_protocol::{
    AdmissionResult, LoginEvent, Message, Phase, PlayerId, QuitEvent, WorldChangeEvent,
};
use warden_storage::Storage;

use crate::denial::{SyncDenial, SyncDenials};
use crate::{Connection, LoginCoordinator, Permissible, Scheduler, SessionError};

/// Warden's login, quit and world-change observers.
pub struct LoginGate<St: Storage, Sc: Scheduler> {
    coordinator: Arc<LoginCoordinator<St, Sc>>,
    denied_sync: SyncDenials,
}

impl<St: Storage, Sc: Scheduler> LoginGate<St, Sc> {
    pub fn new(coordinator: Arc<LoginCoordinator<St, Sc>>) -> Self {
        Self {
            coordinator,
            denied_sync: SyncDenials::new(),
        }
    }

    pub fn coordinator(&self) -> &Arc<LoginCoordinator<St, Sc>> {
        &self.coordinator
    }

    /// `true` while a login denial is waiting for its monitor pass.
    pub fn is_marked_denied(&self, id: &PlayerId) -> bool {
        self.denied_sync.contains(id)
    }

    /// Login recording pass. Runs at the lowest priority.
    ///
    /// Denies anyone whose data isn't loaded. Otherwise installs the
    /// permission wrapper into the connection.
    pub fn on_login<C: Connection>(&mut self, event: &mut LoginEvent<C>) {
        let player = Arc::clone(&event.player);
        let id = player.id();

        if !event.decision.is_allowed() {
            self.denied_sync.record(id, SyncDenial::Host);
            debug!(
                player_id = %id,
                result = %event.decision.result(),
                "login already denied, not attaching permissions"
            );
            return;
        }

        let coordinator = &self.coordinator;
        let Some(user) = coordinator.store().get_loaded_user(&id) else {
            self.denied_sync.record(id, SyncDenial::NotLoaded);
            warn!(
                player_id = %id,
                name = %player.name(),
                "user data is not loaded, denying login"
            );
            event
                .decision
                .disallow(AdmissionResult::KickOther, Message::LoadingError.to_string());
            return;
        };

        if coordinator.cancel_cleanup(&id) {
            debug!(player_id = %id, "cancelled pending data release at login");
        }

        match player.attach(Permissible::new(Arc::clone(&user))) {
            Ok(()) => {
                coordinator.stats.attached();
                debug!(player_id = %id, "attached permissions");
            }
            Err(e) => {
                // The player still gets in, with the host's default
                // permission handling.
                coordinator.stats.attach_failed();
                error!(player_id = %id, error = %e, "failed to attach permissions");
            }
        }

        coordinator.refresh_auto_op(&*player);

        if player.is_op() {
            let contexts = coordinator.config().elevated_contexts();
            coordinator.scheduler().run_async(Box::new(move || {
                user.pre_calculate(&contexts);
            }));
        }
    }

    /// Login monitor pass. Runs at the highest priority, after every other
    /// observer.
    ///
    /// # Errors
    /// [`SessionError::InvariantViolation`] if a player Warden denied was
    /// re-allowed. The decision is forced back to denied before returning.
    pub fn on_login_monitor<C: Connection>(
        &mut self,
        event: &mut LoginEvent<C>,
    ) -> Result<(), SessionError> {
        let id = event.player.id();

        if let Some(reason) = self.denied_sync.consume(&id) {
            // Denied before we attached anything, but the data loaded at
            // pre-login is still resident and no quit will follow. Release
            // it later so a quick retry can reuse it. A re-allow below is
            // forced back to denied, so the same holds for it.
            if reason == SyncDenial::Host
                && self.coordinator.store().get_loaded_user(&id).is_some()
            {
                let delay = self.coordinator.config().cleanup_delay_ticks;
                self.coordinator.schedule_cleanup(id, delay);
            }

            if event.decision.is_allowed() {
                return Err(self
                    .coordinator
                    .violation(id, Phase::Login, &mut event.decision));
            }
            return Ok(());
        }

        if !event.decision.is_allowed() {
            info!(
                player_id = %id,
                result = %event.decision.result(),
                "login vetoed after permissions were attached, tearing down"
            );
            self.release_connection(&*event.player);
            return Ok(());
        }

        self.coordinator.refresh_auto_op(&*event.player);
        Ok(())
    }

    /// Observes a quit. Should run after the host and every other quit
    /// observer, so their permission checks still see Warden's data.
    pub fn on_quit<C: Connection>(&mut self, event: &QuitEvent<C>) {
        self.release_connection(&*event.player);
    }

    pub fn on_world_change<C: Connection>(&mut self, event: &WorldChangeEvent<C>) {
        debug!(
            player_id = %event.player.id(),
            from = %event.from,
            to = %event.player.world(),
            "player changed world"
        );
        self.coordinator.refresh_auto_op(&*event.player);
    }

    /// Detaches the wrapper, resets auto-op, and releases the data.
    fn release_connection<C: Connection>(&mut self, player: &C) {
        let id = player.id();
        if player.detach().is_some() {
            self.coordinator.stats.detached();
        }
        if self.coordinator.config().auto_op {
            player.set_op(false);
        }
        self.coordinator.on_leave(id);
    }
}
