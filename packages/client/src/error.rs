//! Error types for the chat client.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The server answered the credentials with `ERROR: <reason>`
    #[error("Registration rejected: {0}")]
    RegistrationRejected(String),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// No reply arrived in time
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
}
