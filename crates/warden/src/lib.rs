//! # Warden
//!
//! A permission-aware login pipeline for multiplayer game servers.
//!
//! Warden makes sure every player who gets online has their permission
//! data loaded and attached, and that the data is released exactly once
//! however they leave: a normal quit, a kick by another plugin halfway
//! through logging in, or a reconnect that beats the cleanup timer.
//!
//! This crate is the host side: a [`Server`] with a main-thread actor,
//! priority-ordered observers, live [`Player`] connections and the
//! built-in commands. The lifecycle logic itself lives in
//! [`warden_session`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use warden::prelude::*;
//! use warden::storage::MemoryStorage;
//!
//! # async fn run() -> Result<(), ServerError> {
//! let server = ServerBuilder::new().build(MemoryStorage::new());
//!
//! let id = PlayerId::random();
//! match server.connect(id, "Alex").await? {
//!     LoginOutcome::Joined(player) => println!("{} is online", player.name()),
//!     LoginOutcome::Denied { message, .. } => println!("kicked: {message}"),
//! }
//!
//! server.disconnect(id).await?;
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod commands;
mod config;
mod error;
mod main_thread;
mod observer;
mod player;
mod scheduler;
mod server;

pub use commands::{
    COMMAND_LABEL, OpCommandFilter, PERMISSION_USER_GETUUID, PERMISSION_USER_SETPRIMARYGROUP,
    WardenCommand,
};
pub use config::ServerConfig;
pub use error::ServerError;
pub use main_thread::{CommandOutcome, SERVER_FULL_MESSAGE, ServerInfo};
pub use observer::{CommandObserver, EventPriority, LoginObserver, PreLoginObserver, QuitObserver};
pub use player::Player;
pub use scheduler::{MainScheduler, MainTaskHandle};
pub use server::{
    ALREADY_CONNECTED_MESSAGE, BANNED_MESSAGE, LoginOutcome, NOT_WHITELISTED_MESSAGE, Server,
    ServerBuilder,
};

pub use warden_protocol as protocol;
pub use warden_session as session;
pub use warden_storage as storage;

/// Convenience re-exports for the common case.
pub mod prelude {
    pub use crate::{
        CommandOutcome, EventPriority, LoginOutcome, Player, Server, ServerBuilder, ServerConfig,
        ServerError,
    };
    pub use warden_protocol::{
        AdmissionResult, Contexts, LoginEvent, Message, Phase, PlayerId, PreLoginEvent, QuitEvent,
    };
    pub use warden_session::{Connection, WardenConfig};
}
