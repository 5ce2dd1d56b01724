//! The main thread: a single Tokio task that owns everything the host only
//! touches from one place.
//!
//! Like a room actor, it owns its state outright and talks to the rest of
//! the server through an mpsc channel: commands in, oneshot replies out.
//! Between commands it ticks the [`TickClock`] and runs the scheduled
//! tasks that fell due.
//!
//! ```text
//!                  ┌──────────────── main thread task ────────────────┐
//!  MainCommand ──→ │ Login / Quit / WorldChange / Command / Run / ...  │
//!                  │                                                   │
//!  TickClock ────→ │ tick: run due TaskQueue tasks, wake tick waiters  │
//!                  └───────────────────────────────────────────────────┘
//! ```
//!
//! Because the [`LoginGate`] lives here, its `&mut self` methods are only
//! ever called from this one task.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use warden_protocol::{
    AdmissionResult, CommandEvent, Decision, LoginEvent, Message, PlayerId, QuitEvent,
    WorldChangeEvent,
};
use warden_session::{Connection, LoginGate, Task};
use warden_storage::Storage;
use warden_tick::{TaskQueue, TickClock};

use crate::commands::{OpCommandFilter, WardenCommand};
use crate::observer::Observers;
use crate::{MainScheduler, Player, ServerError};

/// Kick message when the server is at `max_players`.
pub const SERVER_FULL_MESSAGE: &str = "The server is full!";

/// What happened to a command a player typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// An observer (or the op filter) cancelled it.
    Cancelled,
    /// Warden ran it and sent the player this reply.
    Replied(Message),
    /// Not a Warden command; left for the host.
    Unhandled,
}

/// A snapshot of main-thread state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerInfo {
    /// Ticks completed so far.
    pub tick: u64,
    pub online: usize,
    /// Scheduled tasks not yet run.
    pub pending_tasks: usize,
}

/// Commands sent to the main thread through its channel.
pub(crate) enum MainCommand {
    Login {
        player: Arc<Player>,
        reply: oneshot::Sender<Decision>,
    },

    Quit {
        player_id: PlayerId,
        reply: oneshot::Sender<bool>,
    },

    WorldChange {
        player_id: PlayerId,
        world: String,
        reply: oneshot::Sender<bool>,
    },

    Command {
        player_id: PlayerId,
        message: String,
        reply: oneshot::Sender<Option<CommandOutcome>>,
    },

    /// Run a task on the main thread as soon as possible.
    Run(Task),

    /// Reply once `ticks` more ticks have completed.
    WaitTicks {
        ticks: u64,
        reply: oneshot::Sender<u64>,
    },

    Info {
        reply: oneshot::Sender<ServerInfo>,
    },

    Shutdown,
}

/// Handle to the running main thread. Cheap to clone.
#[derive(Clone)]
pub(crate) struct MainThreadHandle {
    sender: mpsc::Sender<MainCommand>,
}

impl MainThreadHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> MainCommand,
    ) -> Result<T, ServerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(build(reply_tx))
            .await
            .map_err(|_| ServerError::MainThreadStopped)?;
        reply_rx.await.map_err(|_| ServerError::MainThreadStopped)
    }

    pub(crate) async fn login(&self, player: Arc<Player>) -> Result<Decision, ServerError> {
        self.request(|reply| MainCommand::Login { player, reply })
            .await
    }

    pub(crate) async fn quit(&self, player_id: PlayerId) -> Result<bool, ServerError> {
        self.request(|reply| MainCommand::Quit { player_id, reply })
            .await
    }

    pub(crate) async fn change_world(
        &self,
        player_id: PlayerId,
        world: String,
    ) -> Result<bool, ServerError> {
        self.request(|reply| MainCommand::WorldChange {
            player_id,
            world,
            reply,
        })
        .await
    }

    pub(crate) async fn command(
        &self,
        player_id: PlayerId,
        message: String,
    ) -> Result<Option<CommandOutcome>, ServerError> {
        self.request(|reply| MainCommand::Command {
            player_id,
            message,
            reply,
        })
        .await
    }

    pub(crate) async fn run(&self, task: Task) -> Result<(), ServerError> {
        self.sender
            .send(MainCommand::Run(task))
            .await
            .map_err(|_| ServerError::MainThreadStopped)
    }

    pub(crate) async fn wait_ticks(&self, ticks: u64) -> Result<u64, ServerError> {
        self.request(|reply| MainCommand::WaitTicks { ticks, reply })
            .await
    }

    pub(crate) async fn info(&self) -> Result<ServerInfo, ServerError> {
        self.request(|reply| MainCommand::Info { reply }).await
    }

    pub(crate) async fn shutdown(&self) -> Result<(), ServerError> {
        self.sender
            .send(MainCommand::Shutdown)
            .await
            .map_err(|_| ServerError::MainThreadStopped)
    }
}

/// Everything the main thread owns.
pub(crate) struct MainThread<S: Storage> {
    pub(crate) gate: LoginGate<S, MainScheduler>,
    pub(crate) queue: TaskQueue,
    pub(crate) clock: TickClock,
    pub(crate) observers: Arc<Observers>,
    pub(crate) op_filter: OpCommandFilter,
    pub(crate) max_players: usize,
    pub(crate) players: HashMap<PlayerId, Arc<Player>>,
    pub(crate) waiters: Vec<(u64, oneshot::Sender<u64>)>,
}

impl<S: Storage> MainThread<S> {
    /// Spawns the main thread task and returns a handle to it.
    pub(crate) fn spawn(
        self,
        channel_size: usize,
    ) -> (MainThreadHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(channel_size);
        let task = tokio::spawn(self.run(rx));
        (MainThreadHandle { sender: tx }, task)
    }

    async fn run(mut self, mut receiver: mpsc::Receiver<MainCommand>) {
        info!(tick_rate_hz = self.clock.tick_rate_hz(), "main thread started");

        loop {
            tokio::select! {
                cmd = receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        break;
                    }
                }
                tick = self.clock.wait_for_tick() => self.on_tick(tick),
            }
        }

        // Everyone still online quits, so their data is released the
        // normal way.
        let online: Vec<PlayerId> = self.players.keys().copied().collect();
        for player_id in online {
            self.handle_quit(player_id);
        }

        // Deferred releases would never fire once the loop is gone.
        let pending = self.queue.take_all();
        if !pending.is_empty() {
            debug!(count = pending.len(), "running pending tasks before exit");
        }
        for task in pending {
            task();
        }
        info!(ticks = self.clock.tick_count(), "main thread stopped");
    }

    /// Returns `false` when the loop should stop.
    fn handle(&mut self, cmd: MainCommand) -> bool {
        match cmd {
            MainCommand::Login { player, reply } => {
                let decision = self.handle_login(player);
                let _ = reply.send(decision);
            }
            MainCommand::Quit { player_id, reply } => {
                let _ = reply.send(self.handle_quit(player_id));
            }
            MainCommand::WorldChange {
                player_id,
                world,
                reply,
            } => {
                let _ = reply.send(self.handle_world_change(player_id, world));
            }
            MainCommand::Command {
                player_id,
                message,
                reply,
            } => {
                let _ = reply.send(self.handle_command(player_id, message));
            }
            MainCommand::Run(task) => task(),
            MainCommand::WaitTicks { ticks, reply } => {
                let target = self.clock.tick_count() + ticks.max(1);
                self.waiters.push((target, reply));
            }
            MainCommand::Info { reply } => {
                let _ = reply.send(ServerInfo {
                    tick: self.clock.tick_count(),
                    online: self.players.len(),
                    pending_tasks: self.queue.len(),
                });
            }
            MainCommand::Shutdown => {
                info!("main thread shutting down");
                return false;
            }
        }
        true
    }

    fn on_tick(&mut self, tick: u64) {
        for task in self.queue.take_due(tick) {
            task();
        }

        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.waiters)
            .into_iter()
            .partition(|(target, _)| *target <= tick);
        self.waiters = waiting;
        for (_, reply) in ready {
            let _ = reply.send(tick);
        }

        self.clock.record_tick_end();
    }

    /// The late admission check, in priority order.
    fn handle_login(&mut self, player: Arc<Player>) -> Decision {
        let player_id = player.id();
        let mut event = LoginEvent::new(Arc::clone(&player));

        // The host's own check comes before any observer.
        if self.players.len() >= self.max_players {
            event
                .decision
                .disallow(AdmissionResult::KickFull, SERVER_FULL_MESSAGE);
        }

        self.gate.on_login(&mut event);
        for observer in self.observers.login.deciders() {
            observer.on_login(&mut event);
        }
        if let Err(e) = self.gate.on_login_monitor(&mut event) {
            warn!(player_id = %player_id, error = %e, "login observer contract violated");
        }

        let decided = event.decision.clone();
        for observer in self.observers.login.monitors() {
            observer.on_login(&mut event);
        }
        if event.decision != decided {
            warn!(player_id = %player_id, "a monitor observer changed the login decision, reverting");
            event.decision = decided;
        }

        if event.decision.is_allowed() {
            info!(player_id = %player_id, name = %player.name(), world = %player.world(), "player joined");
            self.players.insert(player_id, player);
        } else {
            info!(
                player_id = %player_id,
                result = %event.decision.result(),
                "login denied"
            );
        }
        event.decision
    }

    fn handle_quit(&mut self, player_id: PlayerId) -> bool {
        let Some(player) = self.players.remove(&player_id) else {
            debug!(player_id = %player_id, "quit for a player who isn't online");
            return false;
        };

        let event = QuitEvent { player };
        for observer in self.observers.quit.all() {
            observer.on_quit(&event);
        }
        // Last, so the observers above still saw the attached permissions.
        self.gate.on_quit(&event);
        info!(player_id = %player_id, "player quit");
        true
    }

    fn handle_world_change(&mut self, player_id: PlayerId, world: String) -> bool {
        let Some(player) = self.players.get(&player_id).cloned() else {
            return false;
        };
        let from = player.set_world(world);
        self.gate.on_world_change(&WorldChangeEvent { player, from });
        true
    }

    fn handle_command(&mut self, player_id: PlayerId, message: String) -> Option<CommandOutcome> {
        let player = self.players.get(&player_id).cloned()?;
        let mut event = CommandEvent::new(Arc::clone(&player), message);

        self.op_filter.filter(&mut event);
        for observer in self.observers.command.all() {
            observer.on_command(&mut event);
        }
        if event.cancelled {
            return Some(CommandOutcome::Cancelled);
        }

        let Some(parsed) = WardenCommand::parse(&event.message) else {
            return Some(CommandOutcome::Unhandled);
        };
        let reply = match parsed {
            Ok(command) => command.execute(self.gate.coordinator().store(), &player),
            Err(usage) => usage,
        };
        player.send_message(&reply);
        Some(CommandOutcome::Replied(reply))
    }
}
