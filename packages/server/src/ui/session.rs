//! Connection protocol state machine.
//!
//! ```text
//! Unregistered --valid credentials--> Registered --transport closed--> Closed
//! Unregistered --rejected credentials--> Closed
//! ```
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ChatSession の状態遷移と、各状態で接続へ送られるフレーム
//!
//! ### なぜこのテストが必要か
//! - 未登録の接続の入力は全て資格情報として扱われることを保証
//! - 拒否時は `ERROR: ` 応答の後に接続が閉じられることを保証
//! - 登録済みの接続では `GET_SERVER_STATE` とチャットが区別されることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：登録、チャット、状態取得、切断
//! - 異常系：不正な資格情報、重複、未登録での `GET_SERVER_STATE`
//! - エッジケース：閉じた後の入力

use std::sync::Arc;

use async_trait::async_trait;
use roomchat_shared::protocol::{error_reply, is_server_state_request};

use crate::{
    domain::{ConnectionId, Identity, OutboundFrame, PusherChannel},
    infrastructure::dto::server_state_json,
};

use super::{
    state::AppState,
    worker_pool::{QueueControl, SequentialWorker},
};

/// Protocol state of one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Unregistered,
    Registered(Identity),
    Closed,
}

/// Per-connection protocol handler
pub struct ChatSession {
    connection_id: ConnectionId,
    state: ConnectionState,
    /// Frames to this connection's writer task
    outbound: PusherChannel,
    app: Arc<AppState>,
}

impl ChatSession {
    /// Transport opened: the session starts `Unregistered`.
    pub fn on_open(
        connection_id: ConnectionId,
        outbound: PusherChannel,
        app: Arc<AppState>,
    ) -> Self {
        tracing::debug!(
            "Session for connection '{}' awaiting credentials",
            connection_id
        );
        Self {
            connection_id,
            state: ConnectionState::Unregistered,
            outbound,
            app,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Handle one inbound text payload.
    pub async fn on_payload(&mut self, payload: String) -> QueueControl {
        match &self.state {
            ConnectionState::Unregistered => self.register(payload).await,
            ConnectionState::Registered(identity) => {
                let identity = identity.clone();
                if is_server_state_request(&payload) {
                    self.reply_server_state(&identity).await;
                } else {
                    self.app
                        .send_message_usecase
                        .execute(&identity, payload)
                        .await;
                }
                QueueControl::Continue
            }
            ConnectionState::Closed => {
                tracing::debug!(
                    "Ignoring payload on closed connection '{}'",
                    self.connection_id
                );
                QueueControl::Stop
            }
        }
    }

    /// Handle transport close. Cleans up a registered identity exactly once.
    pub async fn on_close(&mut self) {
        let state = std::mem::replace(&mut self.state, ConnectionState::Closed);
        if let ConnectionState::Registered(identity) = state {
            if let Err(e) = self
                .app
                .disconnect_participant_usecase
                .execute(&self.connection_id, &identity)
                .await
            {
                tracing::error!(
                    "Cleanup of connection '{}' incomplete: {}",
                    self.connection_id,
                    e
                );
            }
        } else {
            tracing::debug!("Connection '{}' closed", self.connection_id);
        }
    }

    async fn register(&mut self, credentials: String) -> QueueControl {
        match self
            .app
            .connect_participant_usecase
            .execute(self.connection_id, &credentials, self.outbound.clone())
            .await
        {
            Ok(identity) => {
                self.state = ConnectionState::Registered(identity);
                QueueControl::Continue
            }
            Err(e) => {
                tracing::warn!(
                    "Rejected registration on connection '{}': {}",
                    self.connection_id,
                    e
                );
                let reason = e.to_string();
                self.send(OutboundFrame::Text(error_reply(&reason)));
                self.send(OutboundFrame::Close { reason });
                self.state = ConnectionState::Closed;
                QueueControl::Stop
            }
        }
    }

    async fn reply_server_state(&self, identity: &Identity) {
        let snapshot = match self.app.get_server_state_usecase.execute().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(
                    "Failed to answer server state request from '{}': {}",
                    identity.username(),
                    e
                );
                return;
            }
        };
        match server_state_json(&snapshot) {
            Ok(json) => self.send(OutboundFrame::Text(json)),
            Err(e) => tracing::error!("Failed to serialize server state: {}", e),
        }
    }

    fn send(&self, frame: OutboundFrame) {
        if self.outbound.send(frame).is_err() {
            tracing::debug!("Connection '{}' writer already gone", self.connection_id);
        }
    }
}

#[async_trait]
impl SequentialWorker for ChatSession {
    async fn process(&mut self, payload: String) -> QueueControl {
        self.on_payload(payload).await
    }

    async fn finish(&mut self) {
        self.on_close().await;
    }
}
