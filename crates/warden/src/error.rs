//! Unified error type for the Warden host runtime.

use warden_session::SessionError;
use warden_storage::StorageError;

/// Top-level error that wraps the crate-specific errors.
///
/// The `#[from]` attributes let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// A config file couldn't be read or parsed.
    #[error("invalid server config: {0}")]
    Config(String),

    /// The main thread has stopped (after shutdown, or if it panicked).
    #[error("main thread is not running")]
    MainThreadStopped,
}
