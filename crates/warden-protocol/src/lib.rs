//! Shared vocabulary for Warden.
//!
//! This crate defines the types that every other layer passes around:
//!
//! - **Identities** ([`PlayerId`], [`Identity`]): who is connecting.
//! - **Contexts** ([`Contexts`]): where a permission is evaluated.
//! - **Events** ([`PreLoginEvent`], [`LoginEvent`], ...): what the host
//!   server fires while a player connects, plays, and leaves.
//! - **Messages** ([`Message`]): the fixed strings players get to see.
//!
//! # Architecture
//!
//! ```text
//! Host server (events) → Session layer (admission) → Storage (user data)
//!                 ↘            ↓             ↙
//!                   Protocol (this crate)
//! ```

mod event;
mod message;
mod types;

pub use event::{
    CommandEvent, Decision, LoginEvent, PreLoginEvent, QuitEvent, WorldChangeEvent,
};
pub use message::Message;
pub use types::{AdmissionResult, Contexts, Identity, Phase, PlayerId};
