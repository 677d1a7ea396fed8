//! WebSocket を使った MessagePusher 実装（Broadcaster）
//!
//! ## 責務
//!
//! - 登録済み接続の `PusherChannel` と、その接続に束縛された Identity を管理
//! - ルーム単位のファンアウト
//!
//! ## 設計ノート
//!
//! `broadcast` は接続表のロックを保持したまま送信しない。
//! 対象ルームの接続をスナップショットとして取り出し、ロック解放後に送信する。
//! これにより遅い送信が登録・切断処理を待たせない。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
    BroadcastReport, ConnectionId, Identity, MessagePushError, MessagePusher, OutboundFrame,
    PusherChannel, RoomName,
};

struct Recipient {
    identity: Identity,
    sender: PusherChannel,
}

/// WebSocket を使った MessagePusher 実装
///
/// ## 使用例
///
/// ```ignore
/// let pusher = WebSocketMessagePusher::new();
/// pusher.register_connection(connection_id, identity, sender).await;
///
/// // ルーム "1" の全接続へ配信
/// let report = pusher.broadcast(&room, "alice : 1 : Hello").await;
/// ```
#[derive(Default)]
pub struct WebSocketMessagePusher {
    /// 登録済みの接続
    ///
    /// Key: ConnectionId
    /// Value: Identity と送信チャンネル
    recipients: RwLock<HashMap<ConnectionId, Recipient>>,
}

impl WebSocketMessagePusher {
    /// 新しい WebSocketMessagePusher を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 登録済み接続数
    pub async fn connection_count(&self) -> usize {
        self.recipients.read().await.len()
    }

    fn push(
        connection_id: &ConnectionId,
        sender: &PusherChannel,
        content: &str,
    ) -> Result<(), MessagePushError> {
        if sender.is_closed() {
            return Err(MessagePushError::ConnectionClosed(connection_id.to_string()));
        }
        sender
            .send(OutboundFrame::Text(content.to_string()))
            .map_err(|_| MessagePushError::ConnectionClosed(connection_id.to_string()))
    }
}

#[async_trait]
impl MessagePusher for WebSocketMessagePusher {
    async fn register_connection(
        &self,
        connection_id: ConnectionId,
        identity: Identity,
        sender: PusherChannel,
    ) {
        tracing::debug!(
            "Connection '{}' registered to MessagePusher as '{}' in room '{}'",
            connection_id,
            identity.username(),
            identity.room()
        );
        self.recipients
            .write()
            .await
            .insert(connection_id, Recipient { identity, sender });
    }

    async fn unregister_connection(&self, connection_id: &ConnectionId) {
        if self.recipients.write().await.remove(connection_id).is_some() {
            tracing::debug!("Connection '{}' unregistered from MessagePusher", connection_id);
        }
    }

    async fn broadcast(&self, room: &RoomName, content: &str) -> BroadcastReport {
        // snapshot-then-send
        let targets: Vec<(ConnectionId, PusherChannel)> = {
            let recipients = self.recipients.read().await;
            recipients
                .iter()
                .filter(|(_, recipient)| recipient.identity.room() == room)
                .map(|(id, recipient)| (*id, recipient.sender.clone()))
                .collect()
        };

        let mut report = BroadcastReport::default();
        for (connection_id, sender) in &targets {
            match Self::push(connection_id, sender, content) {
                Ok(()) => {
                    report.delivered += 1;
                    tracing::debug!("Broadcasted message to connection '{}'", connection_id);
                }
                Err(e) => {
                    // 一部の送信失敗は許容
                    report.failed += 1;
                    tracing::warn!("Failed to push message: {}", e);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - broadcast: 同じルームの接続にだけ配信されること（送信者も含む）
    // - 部分失敗の分離：閉じた接続があっても残りへの配信は継続する
    // - 登録解除後は配信対象外になること
    // ========================================

    fn identity(credentials: &str) -> Identity {
        Identity::from_credentials(credentials).unwrap()
    }

    fn room(name: &str) -> RoomName {
        RoomName::new(name.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_broadcast_only_to_same_room() {
        // テスト項目: 同じルームの接続にのみ配信される
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx_alice, mut rx_alice) = mpsc::unbounded_channel();
        let (tx_bob, mut rx_bob) = mpsc::unbounded_channel();
        let (tx_carol, mut rx_carol) = mpsc::unbounded_channel();
        pusher
            .register_connection(ConnectionId::generate(), identity("alice:1"), tx_alice)
            .await;
        pusher
            .register_connection(ConnectionId::generate(), identity("bob:1"), tx_bob)
            .await;
        pusher
            .register_connection(ConnectionId::generate(), identity("carol:2"), tx_carol)
            .await;

        // when (操作):
        let report = pusher.broadcast(&room("1"), "alice : 1 : hi").await;

        // then (期待する結果):
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 0);
        let expected = Some(OutboundFrame::Text("alice : 1 : hi".to_string()));
        assert_eq!(rx_alice.recv().await, expected);
        assert_eq!(rx_bob.recv().await, expected);
        assert!(rx_carol.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_partial_failure() {
        // テスト項目: 閉じた接続への送信失敗があっても他の接続には配信される
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx_alice, rx_alice) = mpsc::unbounded_channel();
        let (tx_bob, mut rx_bob) = mpsc::unbounded_channel();
        pusher
            .register_connection(ConnectionId::generate(), identity("alice:1"), tx_alice)
            .await;
        pusher
            .register_connection(ConnectionId::generate(), identity("bob:1"), tx_bob)
            .await;
        drop(rx_alice);

        // when (操作):
        let report = pusher.broadcast(&room("1"), "message").await;

        // then (期待する結果):
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(
            rx_bob.recv().await,
            Some(OutboundFrame::Text("message".to_string()))
        );
    }

    #[tokio::test]
    async fn test_unregistered_connection_receives_nothing() {
        // テスト項目: 登録解除した接続には配信されない（解除は冪等）
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let connection_id = ConnectionId::generate();
        pusher
            .register_connection(connection_id, identity("alice:1"), tx)
            .await;

        // when (操作):
        pusher.unregister_connection(&connection_id).await;
        pusher.unregister_connection(&connection_id).await;
        let report = pusher.broadcast(&room("1"), "message").await;

        // then (期待する結果):
        assert_eq!(report, BroadcastReport::default());
        assert_eq!(pusher.connection_count().await, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_room() {
        // テスト項目: 接続のいないルームへの配信もエラーにならない
        // given (前提条件):
        let pusher = WebSocketMessagePusher::new();

        // when (操作):
        let report = pusher.broadcast(&room("1"), "message").await;

        // then (期待する結果):
        assert_eq!(report.delivered, 0);
    }
}
