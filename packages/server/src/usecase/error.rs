//! UseCase error types.

use thiserror::Error;

use crate::domain::{RepositoryError, ValueObjectError};

/// Registration failures. The `Display` text is the reason sent after `ERROR: `.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// Credentials not in `username:room` form
    #[error("malformed credentials: {0}")]
    MalformedCredentials(#[from] ValueObjectError),

    /// Name taken in the room (in-memory registry or storage)
    #[error("username '{username}' is already taken in room '{room}'")]
    DuplicateIdentity { username: String, room: String },

    #[error("registration failed: {0}")]
    Storage(RepositoryError),
}

/// Disconnect cleanup failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisconnectError {
    /// The persisted user row could not be removed; the registry slot is kept
    #[error("failed to remove persisted user: {0}")]
    Storage(RepositoryError),
}

/// Snapshot query failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GetServerStateError {
    #[error("failed to read server state: {0}")]
    Storage(#[from] RepositoryError),
}
