//! Data store gateway for Warden.
//!
//! The session layer needs exactly three things from storage: "is the
//! backend ready?", "load this user", and "is this user loaded?". This crate
//! provides them, plus the pieces behind them:
//!
//! 1. **Backend contract**: [`Storage`], implemented by real persistence
//!    (and by [`MemoryStorage`] for tests and the demo)
//! 2. **Loaded users**: [`User`] with cached permission snapshots, tracked
//!    by the [`UserManager`]
//! 3. **Gateway**: [`DataStore`], the one handle the rest of the stack holds
//!
//! Permission resolution here is intentionally flat (global nodes, then
//! world nodes, then the `*` wildcard). Inheritance is not this crate's job.

#![allow(async_fn_in_trait)]

mod error;
mod manager;
mod memory;
mod storage;
mod store;
mod user;

pub use error::StorageError;
pub use manager::UserManager;
pub use memory::MemoryStorage;
pub use storage::{DEFAULT_GROUP, Node, Storage, UserRecord};
pub use store::DataStore;
pub use user::{PermissionSnapshot, User};
