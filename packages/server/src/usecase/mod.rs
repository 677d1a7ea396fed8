//! UseCase layer: registration, disconnect cleanup, chat fan-out and snapshots.

mod connect_participant;
mod disconnect_participant;
mod error;
mod get_server_state;
mod send_message;

use std::{future::Future, time::Duration};

pub use connect_participant::ConnectParticipantUseCase;
pub use disconnect_participant::DisconnectParticipantUseCase;
pub use error::{ConnectError, DisconnectError, GetServerStateError};
pub use get_server_state::GetServerStateUseCase;
pub use send_message::{MessageDelivery, SendMessageUseCase};

use crate::domain::RepositoryError;

/// Run a storage call, failing with `RepositoryError::Timeout` once `limit` elapses.
async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, RepositoryError>>,
) -> Result<T, RepositoryError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(RepositoryError::Timeout))
}
