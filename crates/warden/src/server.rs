//! `Server` builder and the connection entry points.
//!
//! This ties the layers together: the host's own checks, third-party
//! observers, Warden's [`LoginCoordinator`] for pre-login, and the
//! [`MainThread`] actor for everything after.
//!
//! # Connecting
//!
//! ```text
//!  Server::connect (caller's task)          main thread
//!  ───────────────────────────────          ───────────
//!  reserve id / bans / whitelist
//!  Warden pre-login ── Lowest
//!  third-party observers
//!  Warden monitor ──── Monitor
//!  third-party monitors
//!        │ allowed
//!        └──────── Login ─────────────────→ server full?
//!                                           Warden login ── Lowest
//!                                           third-party observers
//!                                           Warden monitor ── Monitor
//!                  LoginOutcome ←────────── third-party monitors
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{info, warn};
use warden_protocol::{AdmissionResult, Decision, Identity, Phase, PlayerId, PreLoginEvent};
use warden_session::{LoginCoordinator, LoginGate, LoginStatsSnapshot};
use warden_storage::{DataStore, Storage};
use warden_tick::{TaskQueue, TickClock};

use crate::commands::OpCommandFilter;
use crate::main_thread::{CommandOutcome, MainThread, MainThreadHandle, ServerInfo};
use crate::observer::{
    CommandObserver, EventPriority, LoginObserver, Observers, PreLoginObserver, QuitObserver,
};
use crate::{MainScheduler, Player, ServerConfig, ServerError};

/// Kick message for a banned player.
pub const BANNED_MESSAGE: &str = "You are banned from this server.";
/// Kick message for a player missing from the whitelist.
pub const NOT_WHITELISTED_MESSAGE: &str = "You are not whitelisted on this server!";
/// Kick message when the same identity is already connected or connecting.
pub const ALREADY_CONNECTED_MESSAGE: &str = "You are already connected to this server.";

const MAIN_CHANNEL_SIZE: usize = 256;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How a connection attempt ended.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// The player is online.
    Joined(Arc<Player>),
    /// The player was kicked before getting online.
    Denied {
        phase: Phase,
        result: AdmissionResult,
        message: String,
    },
}

impl LoginOutcome {
    fn denied(phase: Phase, decision: &Decision) -> Self {
        Self::Denied {
            phase,
            result: decision.result(),
            message: decision.kick_message().to_string(),
        }
    }

    pub fn is_joined(&self) -> bool {
        matches!(self, Self::Joined(_))
    }

    pub fn player(&self) -> Option<&Arc<Player>> {
        match self {
            Self::Joined(player) => Some(player),
            Self::Denied { .. } => None,
        }
    }

    /// The phase that denied the player, if any.
    pub fn denied_at(&self) -> Option<Phase> {
        match self {
            Self::Joined(_) => None,
            Self::Denied { phase, .. } => Some(*phase),
        }
    }

    pub fn kick_message(&self) -> Option<&str> {
        match self {
            Self::Joined(_) => None,
            Self::Denied { message, .. } => Some(message),
        }
    }
}

/// Builder for configuring and starting a [`Server`].
///
/// # Example
///
/// ```rust,no_run
/// use warden::prelude::*;
/// use warden::storage::MemoryStorage;
///
/// # async fn run() -> Result<(), ServerError> {
/// let server = ServerBuilder::new()
///     .config(ServerConfig::from_json_file("server.json")?)
///     .build(MemoryStorage::new());
/// let outcome = server.connect(PlayerId::random(), "Alex").await?;
/// assert!(outcome.is_joined());
/// server.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct ServerBuilder {
    config: ServerConfig,
    observers: Observers,
    bans: HashSet<PlayerId>,
    whitelist: Option<HashSet<PlayerId>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            observers: Observers::new(),
            bans: HashSet::new(),
            whitelist: None,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config.validated();
        self
    }

    pub fn ban(mut self, id: PlayerId) -> Self {
        self.bans.insert(id);
        self
    }

    /// Turns the whitelist on. Only these identities may connect.
    pub fn whitelist(mut self, ids: impl IntoIterator<Item = PlayerId>) -> Self {
        self.whitelist = Some(ids.into_iter().collect());
        self
    }

    pub fn on_pre_login(mut self, priority: EventPriority, observer: impl PreLoginObserver) -> Self {
        self.observers.pre_login.register(priority, Box::new(observer));
        self
    }

    pub fn on_login(mut self, priority: EventPriority, observer: impl LoginObserver) -> Self {
        self.observers.login.register(priority, Box::new(observer));
        self
    }

    pub fn on_quit(mut self, priority: EventPriority, observer: impl QuitObserver) -> Self {
        self.observers.quit.register(priority, Box::new(observer));
        self
    }

    pub fn on_command(mut self, priority: EventPriority, observer: impl CommandObserver) -> Self {
        self.observers.command.register(priority, Box::new(observer));
        self
    }

    /// Starts the main thread and returns the running server.
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn build<S: Storage>(self, storage: S) -> Server<S> {
        let config = self.config;

        let store = Arc::new(DataStore::new(storage));
        for group in &config.groups {
            store.create_group(group);
        }

        let queue = TaskQueue::new();
        let scheduler = MainScheduler::new(queue.clone());
        let coordinator = Arc::new(LoginCoordinator::new(
            Arc::clone(&store),
            scheduler,
            config.warden.clone(),
        ));
        let observers = Arc::new(self.observers);

        let main = MainThread {
            gate: LoginGate::new(Arc::clone(&coordinator)),
            queue,
            clock: TickClock::new(config.clock()),
            observers: Arc::clone(&observers),
            op_filter: OpCommandFilter::new(config.ops_enabled),
            max_players: config.max_players,
            players: Default::default(),
            waiters: Vec::new(),
        };
        let (handle, task) = main.spawn(MAIN_CHANNEL_SIZE);

        info!(
            tick_rate_hz = config.tick_rate_hz,
            max_players = config.max_players,
            ops_enabled = config.ops_enabled,
            auto_op = config.warden.auto_op,
            "warden server started"
        );

        Server {
            config,
            coordinator,
            observers,
            main: handle,
            main_task: Mutex::new(Some(task)),
            sessions: Mutex::new(HashSet::new()),
            bans: Mutex::new(self.bans),
            whitelist: self.whitelist,
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running server.
pub struct Server<S: Storage> {
    config: ServerConfig,
    coordinator: Arc<LoginCoordinator<S, MainScheduler>>,
    observers: Arc<Observers>,
    main: MainThreadHandle,
    main_task: Mutex<Option<JoinHandle<()>>>,
    /// Identities that are connecting or online.
    sessions: Mutex<HashSet<PlayerId>>,
    bans: Mutex<HashSet<PlayerId>>,
    whitelist: Option<HashSet<PlayerId>>,
}

impl<S: Storage> Server<S> {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<DataStore<S>> {
        self.coordinator.store()
    }

    pub fn coordinator(&self) -> &Arc<LoginCoordinator<S, MainScheduler>> {
        &self.coordinator
    }

    pub fn stats(&self) -> LoginStatsSnapshot {
        self.coordinator.stats()
    }

    pub fn ban(&self, id: PlayerId) {
        lock(&self.bans).insert(id);
    }

    /// Runs the whole admission pipeline for one connection.
    ///
    /// Pre-login runs on the calling task, so many connections can be in
    /// pre-login at once. The login phase runs on the main thread.
    ///
    /// # Errors
    /// [`ServerError::MainThreadStopped`] if the server has shut down.
    /// Every kick is reported as [`LoginOutcome::Denied`], not as an error.
    pub async fn connect(&self, id: PlayerId, name: &str) -> Result<LoginOutcome, ServerError> {
        let mut event = PreLoginEvent::new(Identity::new(id, name));
        let reserved = self.reserve(id);
        self.host_pre_login_check(&mut event, reserved);

        self.coordinator.on_pre_login(&mut event).await;
        for observer in self.observers.pre_login.deciders() {
            observer.on_pre_login(&mut event);
        }
        if let Err(e) = self.coordinator.on_pre_login_monitor(&mut event) {
            warn!(player_id = %id, error = %e, "pre-login observer contract violated");
        }
        self.notify_pre_login_monitors(&mut event);

        if !event.decision.is_allowed() {
            if reserved {
                self.release(&id);
            }
            info!(
                player_id = %id,
                %name,
                result = %event.decision.result(),
                "connection denied at pre-login"
            );
            return Ok(LoginOutcome::denied(Phase::PreLogin, &event.decision));
        }

        let player = Arc::new(Player::new(id, name, self.config.default_world.clone()));
        let decision = match self.main.login(Arc::clone(&player)).await {
            Ok(decision) => decision,
            Err(e) => {
                // Nobody is left to run the login phase; drop what
                // pre-login loaded.
                self.coordinator.on_leave(id);
                self.release(&id);
                return Err(e);
            }
        };

        if decision.is_allowed() {
            Ok(LoginOutcome::Joined(player))
        } else {
            self.release(&id);
            Ok(LoginOutcome::denied(Phase::Login, &decision))
        }
    }

    /// Disconnects an online player. Returns `false` if they weren't
    /// online.
    pub async fn disconnect(&self, id: PlayerId) -> Result<bool, ServerError> {
        let quit = self.main.quit(id).await?;
        if quit {
            self.release(&id);
        }
        Ok(quit)
    }

    /// Moves an online player to another world.
    pub async fn change_world(&self, id: PlayerId, world: impl Into<String>) -> Result<bool, ServerError> {
        self.main.change_world(id, world.into()).await
    }

    /// Delivers a chat command from an online player. `None` if they
    /// aren't online.
    pub async fn dispatch_command(
        &self,
        id: PlayerId,
        message: impl Into<String>,
    ) -> Result<Option<CommandOutcome>, ServerError> {
        self.main.command(id, message.into()).await
    }

    /// Runs `task` on the main thread.
    pub async fn run_on_main(&self, task: impl FnOnce() + Send + 'static) -> Result<(), ServerError> {
        self.main.run(Box::new(task)).await
    }

    /// Waits until `ticks` more main-thread ticks have completed. Returns
    /// the tick number reached.
    pub async fn wait_ticks(&self, ticks: u64) -> Result<u64, ServerError> {
        self.main.wait_ticks(ticks).await
    }

    pub async fn info(&self) -> Result<ServerInfo, ServerError> {
        self.main.info().await
    }

    /// Stops the main thread. Everyone still online quits first.
    pub async fn shutdown(&self) {
        if self.main.shutdown().await.is_err() {
            return;
        }
        let task = lock(&self.main_task).take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "main thread ended abnormally");
            }
        }
        lock(&self.sessions).clear();
        info!("warden server stopped");
    }

    /// Claims `id` for this connection. `false` if it's already claimed.
    fn reserve(&self, id: PlayerId) -> bool {
        lock(&self.sessions).insert(id)
    }

    fn release(&self, id: &PlayerId) {
        lock(&self.sessions).remove(id);
    }

    /// The host's own pre-login checks, which run before any observer.
    fn host_pre_login_check(&self, event: &mut PreLoginEvent, reserved: bool) {
        let id = event.id();
        if !reserved {
            event
                .decision
                .disallow(AdmissionResult::KickOther, ALREADY_CONNECTED_MESSAGE);
        } else if lock(&self.bans).contains(&id) {
            event
                .decision
                .disallow(AdmissionResult::KickBanned, BANNED_MESSAGE);
        } else if self
            .whitelist
            .as_ref()
            .is_some_and(|allowed| !allowed.contains(&id))
        {
            event
                .decision
                .disallow(AdmissionResult::KickWhitelist, NOT_WHITELISTED_MESSAGE);
        }
    }

    fn notify_pre_login_monitors(&self, event: &mut PreLoginEvent) {
        let decided = event.decision.clone();
        for observer in self.observers.pre_login.monitors() {
            observer.on_pre_login(event);
        }
        if event.decision != decided {
            warn!(player_id = %event.id(), "a monitor observer changed the pre-login decision, reverting");
            event.decision = decided;
        }
    }
}
