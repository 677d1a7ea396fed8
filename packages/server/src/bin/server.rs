//! Room-based WebSocket chat server.
//!
//! Clients register as `username:room`, then every text they send is fanned out
//! to the members of the same room. `GET_SERVER_STATE` returns the connected
//! users grouped by room.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin roomchat-server
//! cargo run --bin roomchat-server -- --host 127.0.0.1 --port 3000 --in-memory
//! ```

use std::{process, sync::Arc};

use clap::Parser;
use roomchat_server::{
    config::{ServerArgs, ServerConfig, StorageBackend},
    domain::{ChatRepository, RoomRegistry},
    infrastructure::{
        message_pusher::WebSocketMessagePusher,
        repository::{InMemoryChatRepository, SqliteChatRepository},
    },
    ui::{Server, WorkerPool},
    usecase::{
        ConnectParticipantUseCase, DisconnectParticipantUseCase, GetServerStateUseCase,
        SendMessageUseCase,
    },
};
use roomchat_shared::{logger::setup_logger, time::SystemClock};

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let config = match ServerConfig::try_from(ServerArgs::parse()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            process::exit(1);
        }
    };

    // Initialize dependencies in order:
    // 1. Repository
    // 2. Registry and MessagePusher
    // 3. UseCases
    // 4. Server

    // 1. Create Repository
    let mut sqlite: Option<Arc<SqliteChatRepository>> = None;
    let repository: Arc<dyn ChatRepository> = match &config.storage {
        StorageBackend::InMemory => {
            tracing::info!("Using in-memory storage");
            Arc::new(InMemoryChatRepository::new())
        }
        StorageBackend::Sqlite { url } => {
            match SqliteChatRepository::connect(url, config.storage_timeout).await {
                Ok(repository) => {
                    tracing::info!("Using SQLite storage at {}", url);
                    let repository = Arc::new(repository);
                    sqlite = Some(repository.clone());
                    repository
                }
                Err(e) => {
                    tracing::error!("Failed to open database '{}': {}", url, e);
                    process::exit(1);
                }
            }
        }
    };

    // No connection survives a restart
    match repository.clear_users().await {
        Ok(0) => {}
        Ok(removed) => tracing::info!("Removed {} stale user(s) from storage", removed),
        Err(e) => {
            tracing::error!("Failed to clear stale users: {}", e);
            process::exit(1);
        }
    }

    // 2. Create Registry and MessagePusher (WebSocket implementation)
    let registry = Arc::new(RoomRegistry::new());
    let message_pusher = Arc::new(WebSocketMessagePusher::new());

    // 3. Create UseCases
    let connect_participant_usecase = Arc::new(ConnectParticipantUseCase::new(
        registry.clone(),
        repository.clone(),
        message_pusher.clone(),
        config.storage_timeout,
    ));
    let disconnect_participant_usecase = Arc::new(DisconnectParticipantUseCase::new(
        registry.clone(),
        repository.clone(),
        message_pusher.clone(),
        config.storage_timeout,
    ));
    let send_message_usecase = Arc::new(SendMessageUseCase::new(
        repository.clone(),
        message_pusher.clone(),
        Arc::new(SystemClock),
        config.storage_timeout,
    ));
    let get_server_state_usecase = Arc::new(GetServerStateUseCase::new(
        repository.clone(),
        config.storage_timeout,
    ));

    // 4. Create and run Server
    let server = Server::new(
        connect_participant_usecase,
        disconnect_participant_usecase,
        send_message_usecase,
        get_server_state_usecase,
        WorkerPool::new(config.workers),
    );
    tracing::info!("Worker pool size: {}", config.workers);

    let result = server.run(config.host.clone(), config.port).await;

    if let Some(sqlite) = sqlite {
        sqlite.close().await;
    }

    if let Err(e) = result {
        tracing::error!("Server error: {}", e);
        process::exit(1);
    }
}
