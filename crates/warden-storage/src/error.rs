//! Error types for the storage layer.

use warden_protocol::PlayerId;

/// Errors that can occur while talking to the backing data store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The store isn't accepting logins (still starting up, or shut down).
    #[error("storage is not accepting logins")]
    NotReady,

    /// Loading a user's data failed. Carries the backend's reason.
    #[error("failed to load user {0}: {1}")]
    LoadFailed(PlayerId, String),

    /// Saving a user's data failed.
    #[error("failed to save user {0}: {1}")]
    SaveFailed(PlayerId, String),

    /// The user isn't loaded, so there is nothing to operate on.
    #[error("user {0} is not loaded")]
    NotLoaded(PlayerId),
}
