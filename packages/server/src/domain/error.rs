//! Domain error types.

use thiserror::Error;

/// Validation errors raised while building value objects
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("value must not be empty")]
    Empty,

    #[error("value must be at most {max} characters")]
    TooLong { max: usize },

    #[error("credentials must have the form '<username>:<room>'")]
    MalformedCredentials,
}

/// Errors raised by the in-memory room registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("username '{username}' is already taken in room '{room}'")]
    DuplicateIdentity { username: String, room: String },

    /// The previous owner left but its storage row has not been removed yet
    #[error("username '{username}' in room '{room}' is waiting for cleanup")]
    PendingCleanup { username: String, room: String },
}

/// Errors raised by the persistence gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// The (username, room) pair already exists (unique constraint)
    #[error("user '{username}' already exists in room '{room}'")]
    DuplicateUser { username: String, room: String },

    #[error("user '{username}' is not registered in room '{room}'")]
    UserNotFound { username: String, room: String },

    #[error("storage timed out")]
    Timeout,

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors raised while pushing frames to connections
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagePushError {
    #[error("connection '{0}' is closed")]
    ConnectionClosed(String),
}
