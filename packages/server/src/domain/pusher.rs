//! MessagePusher trait 定義
//!
//! 接続中のクライアントへフレームを届けるためのインターフェース（Broadcaster）。
//! 具体的な実装（WebSocket など）は Infrastructure 層が提供します。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ConnectionId, Identity, RoomName};

/// Frame sent from the server to one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// Text frame
    Text(String),
    /// Close the connection with a protocol-error close code
    Close { reason: String },
}

/// Channel feeding one connection's writer task
pub type PusherChannel = mpsc::UnboundedSender<OutboundFrame>;

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BroadcastReport {
    /// Connections the payload was handed to
    pub delivered: usize,
    /// Connections that were closed or whose send failed
    pub failed: usize,
}

/// MessagePusher trait
///
/// ## 配信の保証
///
/// ベストエフォート・at-most-once。個々の接続への送信失敗はログに記録してスキップし、
/// 残りの接続への配信は継続する。
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// 登録済みの接続を配信対象に加える
    async fn register_connection(
        &self,
        connection_id: ConnectionId,
        identity: Identity,
        sender: PusherChannel,
    );

    /// 接続を配信対象から外す（冪等）
    async fn unregister_connection(&self, connection_id: &ConnectionId);

    /// `room` に属する全ての開いている接続へ `content` を配信する（送信者も含む）
    async fn broadcast(&self, room: &RoomName, content: &str) -> BroadcastReport;
}
