//! UseCase: 参加者切断処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DisconnectParticipantUseCase::execute() メソッド
//! - 配信対象からの除外、ストレージからの削除、レジストリからの削除
//! - 削除失敗後の再試行と、削除待ちスロットの再登録
//!
//! ### なぜこのテストが必要か
//! - 切断後は同じ (username, room) で再登録できなければならない
//! - ストレージに残った行がレジストリにない状態（幽霊ユーザー）を作ってはならない
//! - 一時的な削除失敗で名前が再起動まで使えなくなってはならない
//!
//! ### どのような状況を想定しているか
//! - 正常系：登録済みの接続の切断
//! - 異常系：ストレージからの削除失敗（バックグラウンドでの再試行、再登録時の削除）
//! - エッジケース：同じ接続の二重切断

use std::{sync::Arc, time::Duration};

use crate::domain::{ChatRepository, ConnectionId, Identity, MessagePusher, RoomRegistry};

use super::{bounded, error::DisconnectError};

/// 削除に失敗した行を再削除するまでの待ち時間（試行ごと）
pub const CLEANUP_BACKOFF: [Duration; 5] = [
    Duration::from_millis(200),
    Duration::from_secs(1),
    Duration::from_secs(5),
    Duration::from_secs(15),
    Duration::from_secs(60),
];

/// 参加者切断のユースケース
pub struct DisconnectParticipantUseCase {
    registry: Arc<RoomRegistry>,
    /// Repository（永続化の抽象化）
    repository: Arc<dyn ChatRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
    storage_timeout: Duration,
    /// 削除失敗時の再試行間隔。空なら再試行せず、次の同名登録に任せる
    cleanup_backoff: Vec<Duration>,
}

impl DisconnectParticipantUseCase {
    /// 新しい DisconnectParticipantUseCase を作成
    pub fn new(
        registry: Arc<RoomRegistry>,
        repository: Arc<dyn ChatRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            repository,
            message_pusher,
            storage_timeout,
            cleanup_backoff: CLEANUP_BACKOFF.to_vec(),
        }
    }

    /// 削除失敗時の再試行間隔を差し替える
    pub fn with_cleanup_backoff(mut self, backoff: Vec<Duration>) -> Self {
        self.cleanup_backoff = backoff;
        self
    }

    /// 参加者切断を実行
    ///
    /// 配信対象から外した後、ストレージの行を削除し、最後にレジストリから外す。
    /// ストレージからの削除に失敗した場合はスロットを削除待ちとして残し
    /// （レジストリは常にストレージの上位集合）、バックグラウンドで削除を再試行する。
    /// 再試行より先に同名の登録が来た場合は、登録側が行を削除してスロットを引き継ぐ。
    ///
    /// # Arguments
    ///
    /// * `connection_id` - 切断された接続の ID
    /// * `identity` - 接続に束縛されていた Identity
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        identity: &Identity,
    ) -> Result<(), DisconnectError> {
        // 1. 配信対象から除外
        self.message_pusher
            .unregister_connection(connection_id)
            .await;

        // 2. ストレージから削除
        if let Err(e) = bounded(self.storage_timeout, self.repository.remove_user(identity)).await
        {
            tracing::error!(
                "Failed to remove '{}' in room '{}' from storage, slot kept pending cleanup: {}",
                identity.username(),
                identity.room(),
                e
            );
            if self.registry.mark_pending_cleanup(identity) && !self.cleanup_backoff.is_empty() {
                tokio::spawn(retry_cleanup(
                    self.registry.clone(),
                    self.repository.clone(),
                    identity.clone(),
                    self.storage_timeout,
                    self.cleanup_backoff.clone(),
                ));
            }
            return Err(DisconnectError::Storage(e));
        }

        // 3. レジストリから削除
        if !self.registry.unregister(identity) {
            tracing::debug!(
                "'{}' in room '{}' was already absent from the registry",
                identity.username(),
                identity.room()
            );
        }

        tracing::info!(
            "Connection '{}' ('{}' in room '{}') disconnected",
            connection_id,
            identity.username(),
            identity.room()
        );
        Ok(())
    }
}

/// 削除待ちの行を backoff に従って再削除し、成功したらスロットを解放する
///
/// スロットを同名の登録が引き継いだ場合（claim できない場合）はそこで終了する。
async fn retry_cleanup(
    registry: Arc<RoomRegistry>,
    repository: Arc<dyn ChatRepository>,
    identity: Identity,
    storage_timeout: Duration,
    backoff: Vec<Duration>,
) {
    for (attempt, delay) in backoff.into_iter().enumerate() {
        tokio::time::sleep(delay).await;

        let Some(claim) = registry.claim_cleanup(&identity) else {
            tracing::debug!(
                "Cleanup of '{}' in room '{}' was taken over",
                identity.username(),
                identity.room()
            );
            return;
        };

        match bounded(storage_timeout, repository.remove_user(&identity)).await {
            Ok(()) => {
                claim.release();
                tracing::info!(
                    "Removed '{}' in room '{}' from storage on retry {}",
                    identity.username(),
                    identity.room(),
                    attempt + 1
                );
                return;
            }
            Err(e) => {
                tracing::warn!(
                    "Retry {} to remove '{}' in room '{}' failed: {}",
                    attempt + 1,
                    identity.username(),
                    identity.room(),
                    e
                );
            }
        }
    }

    tracing::error!(
        "Giving up removing '{}' in room '{}'; the next registration of the name retries",
        identity.username(),
        identity.room()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{OutboundFrame, RepositoryError, repository::MockChatRepository},
        infrastructure::{
            message_pusher::WebSocketMessagePusher, repository::InMemoryChatRepository,
        },
        usecase::ConnectParticipantUseCase,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    const STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

    fn identity(credentials: &str) -> Identity {
        Identity::from_credentials(credentials).unwrap()
    }

    #[tokio::test]
    async fn test_disconnect_participant_success() {
        // テスト項目: 切断でレジストリ・ストレージ・Pusher から取り除かれる
        // given (前提条件):
        let registry = Arc::new(RoomRegistry::new());
        let repository = Arc::new(InMemoryChatRepository::new());
        let message_pusher = Arc::new(WebSocketMessagePusher::new());
        let connect = ConnectParticipantUseCase::new(
            registry.clone(),
            repository.clone(),
            message_pusher.clone(),
            STORAGE_TIMEOUT,
        );
        let disconnect = DisconnectParticipantUseCase::new(
            registry.clone(),
            repository.clone(),
            message_pusher.clone(),
            STORAGE_TIMEOUT,
        );
        let (tx, _rx) = mpsc::unbounded_channel::<OutboundFrame>();
        let connection_id = ConnectionId::generate();
        let alice = connect.execute(connection_id, "alice:1", tx).await.unwrap();

        // when (操作):
        let result = disconnect.execute(&connection_id, &alice).await;

        // then (期待する結果):
        assert_eq!(result, Ok(()));
        assert!(!registry.contains(&alice));
        assert!(repository.current_state().await.unwrap().is_empty());
        assert_eq!(message_pusher.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_reregister_after_disconnect() {
        // テスト項目: 切断後は同じ (username, room) で再登録できる
        // given (前提条件):
        let registry = Arc::new(RoomRegistry::new());
        let repository = Arc::new(InMemoryChatRepository::new());
        let message_pusher = Arc::new(WebSocketMessagePusher::new());
        let connect = ConnectParticipantUseCase::new(
            registry.clone(),
            repository.clone(),
            message_pusher.clone(),
            STORAGE_TIMEOUT,
        );
        let disconnect = DisconnectParticipantUseCase::new(
            registry.clone(),
            repository.clone(),
            message_pusher.clone(),
            STORAGE_TIMEOUT,
        );
        let (tx, _rx) = mpsc::unbounded_channel::<OutboundFrame>();
        let first = ConnectionId::generate();
        let alice = connect.execute(first, "alice:1", tx.clone()).await.unwrap();
        disconnect.execute(&first, &alice).await.unwrap();

        // when (操作):
        let result = connect
            .execute(ConnectionId::generate(), "alice:1", tx)
            .await;

        // then (期待する結果):
        assert_eq!(result, Ok(alice));
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_registry_slot() {
        // テスト項目: ストレージからの削除に失敗した場合、スロットは削除待ちとして残る
        // given (前提条件):
        let registry = Arc::new(RoomRegistry::new());
        let alice = identity("alice:1");
        registry.register(&alice).unwrap();
        let mut repository = MockChatRepository::new();
        repository
            .expect_remove_user()
            .times(1)
            .returning(|_| Err(RepositoryError::Storage("database is locked".to_string())));
        let disconnect = DisconnectParticipantUseCase::new(
            registry.clone(),
            Arc::new(repository),
            Arc::new(WebSocketMessagePusher::new()),
            STORAGE_TIMEOUT,
        )
        .with_cleanup_backoff(Vec::new());

        // when (操作):
        let result = disconnect
            .execute(&ConnectionId::generate(), &alice)
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(DisconnectError::Storage(RepositoryError::Storage(
                "database is locked".to_string()
            )))
        );
        assert!(registry.contains(&alice));
        assert!(registry.is_pending_cleanup(&alice));
    }

    #[tokio::test]
    async fn test_disconnect_twice_is_harmless() {
        // テスト項目: 同じ接続の二重切断はエラーにならない
        // given (前提条件):
        let registry = Arc::new(RoomRegistry::new());
        let alice = identity("alice:1");
        registry.register(&alice).unwrap();
        let disconnect = DisconnectParticipantUseCase::new(
            registry.clone(),
            Arc::new(InMemoryChatRepository::new()),
            Arc::new(WebSocketMessagePusher::new()),
            STORAGE_TIMEOUT,
        );
        let connection_id = ConnectionId::generate();
        disconnect.execute(&connection_id, &alice).await.unwrap();

        // when (操作):
        let result = disconnect.execute(&connection_id, &alice).await;

        // then (期待する結果):
        assert_eq!(result, Ok(()));
        assert!(!registry.contains(&alice));
    }

    /// remove_user が最初の `failures` 回だけ失敗し、その後は成功する Mock
    fn flaky_remove_repository(failures: usize) -> MockChatRepository {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut repository = MockChatRepository::new();
        repository.expect_remove_user().returning(move |_| {
            if calls.fetch_add(1, Ordering::SeqCst) < failures {
                Err(RepositoryError::Storage("busy".to_string()))
            } else {
                Ok(())
            }
        });
        repository.expect_ensure_room_exists().returning(|_| Ok(()));
        repository.expect_add_user().returning(|_| Ok(()));
        repository
    }

    #[tokio::test]
    async fn test_reregister_after_transient_removal_failure() {
        // テスト項目: 切断時の削除が一度失敗しても、同じ (username, room) で再登録できる
        // given (前提条件):
        let registry = Arc::new(RoomRegistry::new());
        let repository: Arc<dyn ChatRepository> = Arc::new(flaky_remove_repository(1));
        let message_pusher = Arc::new(WebSocketMessagePusher::new());
        let connect = ConnectParticipantUseCase::new(
            registry.clone(),
            repository.clone(),
            message_pusher.clone(),
            STORAGE_TIMEOUT,
        );
        let disconnect = DisconnectParticipantUseCase::new(
            registry.clone(),
            repository,
            message_pusher,
            STORAGE_TIMEOUT,
        )
        .with_cleanup_backoff(Vec::new());
        let (tx, _rx) = mpsc::unbounded_channel::<OutboundFrame>();
        let first = ConnectionId::generate();
        let alice = connect.execute(first, "alice:1", tx.clone()).await.unwrap();
        assert!(disconnect.execute(&first, &alice).await.is_err());

        // when (操作):
        let result = connect
            .execute(ConnectionId::generate(), "alice:1", tx)
            .await;

        // then (期待する結果):
        assert_eq!(result, Ok(alice.clone()));
        assert!(!registry.is_pending_cleanup(&alice));
        assert_eq!(registry.members_of(alice.room()).len(), 1);
    }

    #[tokio::test]
    async fn test_failed_removal_is_retried_in_background() {
        // テスト項目: 削除に失敗した行はバックグラウンドで再削除され、スロットが解放される
        // given (前提条件):
        let registry = Arc::new(RoomRegistry::new());
        let alice = identity("alice:1");
        registry.register(&alice).unwrap();
        let disconnect = DisconnectParticipantUseCase::new(
            registry.clone(),
            Arc::new(flaky_remove_repository(2)),
            Arc::new(WebSocketMessagePusher::new()),
            STORAGE_TIMEOUT,
        )
        .with_cleanup_backoff(vec![Duration::from_millis(10); 3]);

        // when (操作):
        let result = disconnect
            .execute(&ConnectionId::generate(), &alice)
            .await;
        let released = tokio::time::timeout(Duration::from_secs(5), async {
            while registry.contains(&alice) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;

        // then (期待する結果):
        assert!(result.is_err());
        assert!(released.is_ok());
        assert!(registry.register(&alice).is_ok());
    }
}
