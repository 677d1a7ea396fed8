//! Server state shared by all handlers.

use std::sync::Arc;

use crate::usecase::{
    ConnectParticipantUseCase, DisconnectParticipantUseCase, GetServerStateUseCase,
    SendMessageUseCase,
};

use super::worker_pool::WorkerPool;

/// Shared application state
pub struct AppState {
    /// ConnectParticipantUseCase（参加者登録のユースケース）
    pub connect_participant_usecase: Arc<ConnectParticipantUseCase>,
    /// DisconnectParticipantUseCase（参加者切断のユースケース）
    pub disconnect_participant_usecase: Arc<DisconnectParticipantUseCase>,
    /// SendMessageUseCase（メッセージ送信のユースケース）
    pub send_message_usecase: Arc<SendMessageUseCase>,
    /// GetServerStateUseCase（接続中ユーザー一覧のユースケース）
    pub get_server_state_usecase: Arc<GetServerStateUseCase>,
    /// 受信 payload を処理するワーカープール
    pub worker_pool: WorkerPool,
}
