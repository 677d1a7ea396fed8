//! UseCase: メッセージ送信処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SendMessageUseCase::execute() メソッド
//! - メッセージの永続化と同じルームへのファンアウト
//!
//! ### なぜこのテストが必要か
//! - 送信者を含む同じルームの全員に届き、他のルームには届かないことを保証
//! - 永続化に失敗してもファンアウトは行われることを保証
//! - 本文はそのまま（コロンや空白を含めて）配信されることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：メッセージ送信とブロードキャスト
//! - 異常系：永続化の失敗
//! - エッジケース：本文に区切り文字を含む

use std::{sync::Arc, time::Duration};

use roomchat_shared::time::Clock;

use crate::domain::{
    BroadcastReport, ChatMessage, ChatRepository, Identity, MessagePusher, Timestamp,
};

use super::bounded;

/// Outcome of one chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageDelivery {
    pub report: BroadcastReport,
    /// Whether the message was written to storage
    pub persisted: bool,
}

/// メッセージ送信のユースケース
pub struct SendMessageUseCase {
    /// Repository（永続化の抽象化）
    repository: Arc<dyn ChatRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
    /// タイムスタンプの発行元
    clock: Arc<dyn Clock>,
    storage_timeout: Duration,
}

impl SendMessageUseCase {
    /// 新しい SendMessageUseCase を作成
    pub fn new(
        repository: Arc<dyn ChatRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            repository,
            message_pusher,
            clock,
            storage_timeout,
        }
    }

    /// メッセージ送信を実行
    ///
    /// # Arguments
    ///
    /// * `author` - 送信した接続に束縛された Identity
    /// * `content` - 受信したテキストそのまま
    ///
    /// # Returns
    ///
    /// 配信結果と永続化の成否。永続化の失敗はログに記録し、配信は継続する。
    pub async fn execute(&self, author: &Identity, content: String) -> MessageDelivery {
        let message = ChatMessage::new(
            author.clone(),
            content,
            Timestamp::new(self.clock.now_millis()),
        );

        // 1. 永続化（失敗してもファンアウトは行う）
        let persisted =
            match bounded(self.storage_timeout, self.repository.save_message(&message)).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(
                        "Failed to save message from '{}' in room '{}': {}",
                        author.username(),
                        author.room(),
                        e
                    );
                    false
                }
            };

        // 2. 同じルームの全接続へ配信（送信者を含む）
        let report = self
            .message_pusher
            .broadcast(author.room(), &message.to_wire())
            .await;
        tracing::debug!(
            "Message from '{}' in room '{}' delivered to {} connection(s), {} failed",
            author.username(),
            author.room(),
            report.delivered,
            report.failed
        );

        MessageDelivery { report, persisted }
    }
}
