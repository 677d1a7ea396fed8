//! UseCase: サーバー状態（接続中ユーザー一覧）の取得
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - GetServerStateUseCase::execute() メソッド
//!
//! ### なぜこのテストが必要か
//! - 一覧はストレージを正とし、ルーム順が決定的であることを保証
//! - ストレージ失敗がエラーとして呼び出し元へ伝わることを確認

use std::{sync::Arc, time::Duration};

use crate::domain::{ChatRepository, ServerSnapshot};

use super::{bounded, error::GetServerStateError};

/// サーバー状態取得のユースケース
pub struct GetServerStateUseCase {
    repository: Arc<dyn ChatRepository>,
    storage_timeout: Duration,
}

impl GetServerStateUseCase {
    pub fn new(repository: Arc<dyn ChatRepository>, storage_timeout: Duration) -> Self {
        Self {
            repository,
            storage_timeout,
        }
    }

    /// 現在の接続中ユーザーをルームごとにまとめたスナップショットを取得
    pub async fn execute(&self) -> Result<ServerSnapshot, GetServerStateError> {
        let rooms = bounded(self.storage_timeout, self.repository.current_state()).await?;
        Ok(ServerSnapshot::new(rooms))
    }
}
