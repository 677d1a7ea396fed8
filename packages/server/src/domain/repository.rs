//! Repository trait 定義
//!
//! ドメイン層が必要とする永続化のインターフェース（rooms / users / messages テーブル）を定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。
//!
//! ## 整合性
//!
//! - `add_user` は (username, room) の一意制約で重複を検出する。
//!   インメモリのレジストリとは独立した、クラッシュ後も有効な重複判定の根拠となる
//! - `users` テーブルは「現在接続中のユーザー」の正とし、`GET_SERVER_STATE` の応答に使う

use async_trait::async_trait;

use super::{ChatMessage, Identity, RepositoryError, RoomName, RoomOccupancy};

/// Chat Repository trait
///
/// UseCase 層はこの trait に依存し、Infrastructure 層の具体的な実装には依存しない。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// ルームが存在しなければ作成（冪等）
    async fn ensure_room_exists(&self, room: &RoomName) -> Result<(), RepositoryError>;

    /// 接続中ユーザーを追加
    ///
    /// (username, room) が既に存在する場合は `RepositoryError::DuplicateUser` を返す。
    /// ルームが存在しない場合は作成する。
    async fn add_user(&self, identity: &Identity) -> Result<(), RepositoryError>;

    /// 接続中ユーザーを削除（冪等）
    async fn remove_user(&self, identity: &Identity) -> Result<(), RepositoryError>;

    /// メッセージを追記
    async fn save_message(&self, message: &ChatMessage) -> Result<(), RepositoryError>;

    /// 接続中ユーザーのスナップショットを取得
    ///
    /// ルーム内のユーザーは追加順に並ぶ。
    async fn current_state(&self) -> Result<Vec<RoomOccupancy>, RepositoryError>;

    /// 全ての接続中ユーザーを削除し、削除件数を返す
    ///
    /// サーバー起動時に、前回のプロセスから残ったユーザーを片付けるために使う。
    async fn clear_users(&self) -> Result<u64, RepositoryError>;
}
