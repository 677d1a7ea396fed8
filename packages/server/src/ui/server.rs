//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::usecase::{
    ConnectParticipantUseCase, DisconnectParticipantUseCase, GetServerStateUseCase,
    SendMessageUseCase,
};

use super::{
    handler::{get_server_state, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
    worker_pool::WorkerPool,
};

/// WebSocket chat server
///
/// This struct encapsulates the server configuration and provides methods to run the server.
///
/// # Example
///
/// ```ignore
/// let server = Server::new(
///     connect_participant_usecase,
///     disconnect_participant_usecase,
///     send_message_usecase,
///     get_server_state_usecase,
///     WorkerPool::new(10),
/// );
/// server.run("0.0.0.0".to_string(), 8081).await?;
/// ```
pub struct Server {
    /// ConnectParticipantUseCase（参加者登録のユースケース）
    connect_participant_usecase: Arc<ConnectParticipantUseCase>,
    /// DisconnectParticipantUseCase（参加者切断のユースケース）
    disconnect_participant_usecase: Arc<DisconnectParticipantUseCase>,
    /// SendMessageUseCase（メッセージ送信のユースケース）
    send_message_usecase: Arc<SendMessageUseCase>,
    /// GetServerStateUseCase（接続中ユーザー一覧のユースケース）
    get_server_state_usecase: Arc<GetServerStateUseCase>,
    /// 受信 payload を処理するワーカープール
    worker_pool: WorkerPool,
}

impl Server {
    /// Create a new Server instance
    ///
    /// # Arguments
    ///
    /// * `connect_participant_usecase` - UseCase for registration
    /// * `disconnect_participant_usecase` - UseCase for disconnect cleanup
    /// * `send_message_usecase` - UseCase for chat fan-out
    /// * `get_server_state_usecase` - UseCase for the connected-user snapshot
    /// * `worker_pool` - Pool processing inbound payloads
    pub fn new(
        connect_participant_usecase: Arc<ConnectParticipantUseCase>,
        disconnect_participant_usecase: Arc<DisconnectParticipantUseCase>,
        send_message_usecase: Arc<SendMessageUseCase>,
        get_server_state_usecase: Arc<GetServerStateUseCase>,
        worker_pool: WorkerPool,
    ) -> Self {
        Self {
            connect_participant_usecase,
            disconnect_participant_usecase,
            send_message_usecase,
            get_server_state_usecase,
            worker_pool,
        }
    }

    /// Build the router serving `/chat` and the HTTP API
    pub fn into_router(self) -> Router {
        let app_state = Arc::new(AppState {
            connect_participant_usecase: self.connect_participant_usecase,
            disconnect_participant_usecase: self.disconnect_participant_usecase,
            send_message_usecase: self.send_message_usecase,
            get_server_state_usecase: self.get_server_state_usecase,
            worker_pool: self.worker_pool,
        });

        Router::new()
            // WebSocket エンドポイント
            .route("/chat", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .route("/api/server-state", get(get_server_state))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state)
    }

    /// Run the WebSocket chat server until Ctrl+C, SIGTERM or `stop` on the console
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "0.0.0.0")
    /// * `port` - The port number to bind to (e.g., 8081)
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> std::io::Result<()> {
        // Bind the server to the host and port
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Connect to: ws://{}/chat", bind_addr);
        tracing::info!("Press Ctrl+C or type 'stop' to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(
            "WebSocket chat server listening on {}",
            listener.local_addr()?
        );

        axum::serve(listener, self.into_router())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
