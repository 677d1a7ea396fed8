//! UseCase: 参加者登録処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectParticipantUseCase::execute() メソッド
//! - 資格情報の解析、重複判定（レジストリ + ストレージ）、永続化、ロールバック
//!
//! ### なぜこのテストが必要か
//! - 同じ (username, room) を持つ接続が同時に 2 つ存在してはならない
//! - ストレージ失敗時にレジストリへ名前が残ってはならない（補償ロールバック）
//! - 不正な資格情報ではどの状態も変更してはならない
//!
//! ### どのような状況を想定しているか
//! - 正常系：新規ユーザーの登録
//! - 異常系：不正な資格情報、重複、ストレージ失敗、ストレージのタイムアウト
//! - 切断時の行削除に失敗して削除待ちになったスロットの引き継ぎ
//! - 並行性：同一 (username, room) の同時登録

use std::{sync::Arc, time::Duration};

use roomchat_shared::protocol::REGISTRATION_SUCCESS;

use crate::domain::{
    ChatRepository, ConnectionId, Identity, MessagePusher, OutboundFrame, PusherChannel,
    RegistryError, RepositoryError, Reservation, RoomRegistry,
};

use super::{bounded, error::ConnectError};

/// 参加者登録のユースケース
pub struct ConnectParticipantUseCase {
    /// インメモリのルームレジストリ
    registry: Arc<RoomRegistry>,
    /// Repository（永続化の抽象化）
    repository: Arc<dyn ChatRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
    /// ストレージ呼び出しの待ち時間の上限
    storage_timeout: Duration,
}

impl ConnectParticipantUseCase {
    /// 新しい ConnectParticipantUseCase を作成
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
        }
    }

    /// 参加者登録を実行
    ///
    /// # Arguments
    ///
    /// * `connection_id` - 登録する接続の ID
    /// * `credentials` - `"<username>:<room>"` 形式の資格情報
    /// * `sender` - 接続へのフレーム送信用チャンネル。`REGISTRATION_SUCCESS` を送った後で
    ///   ファンアウト対象に登録されるため、登録成功の応答は必ずチャットより先に届く
    ///
    /// # Returns
    ///
    /// * `Ok(Identity)` - 登録成功（接続に束縛する Identity）
    /// * `Err(ConnectError)` - 登録失敗。レジストリにもストレージにも痕跡は残らない
    pub async fn execute(
        &self,
        connection_id: ConnectionId,
        credentials: &str,
        sender: PusherChannel,
    ) -> Result<Identity, ConnectError> {
        // 1. 資格情報の解析（失敗時は何も変更しない）
        let identity = Identity::from_credentials(credentials)?;

        // 2. レジストリのスロットを予約（同一ルーム内で排他的な check-then-insert）
        let reservation = match self.registry.reserve(&identity) {
            Ok(reservation) => reservation,
            Err(RegistryError::PendingCleanup { .. }) => self.take_over(&identity).await?,
            Err(RegistryError::DuplicateIdentity { .. }) => {
                return Err(duplicate_identity(&identity));
            }
        };

        // 3. 永続化（失敗時は reservation の drop でスロットを解放）
        if let Err(e) = bounded(self.storage_timeout, self.persist(&identity)).await {
            return Err(self.fail_registration(&identity, e).await);
        }

        // 4. 確定し、応答してからファンアウト対象に加える
        reservation.commit();
        if sender
            .send(OutboundFrame::Text(REGISTRATION_SUCCESS.to_string()))
            .is_err()
        {
            tracing::debug!("Connection '{}' closed before acknowledgement", connection_id);
        }
        self.message_pusher
            .register_connection(connection_id, identity.clone(), sender)
            .await;

        tracing::info!(
            "Connection '{}' registered as '{}' in room '{}'",
            connection_id,
            identity.username(),
            identity.room()
        );
        Ok(identity)
    }

    /// 前の接続の行が削除待ちで残っているスロットを引き継ぐ
    ///
    /// 残った行を先に削除し、成功した場合だけスロットを予約に切り替える。
    /// 削除に失敗した場合、スロットは削除待ちのまま残る。
    async fn take_over(&self, identity: &Identity) -> Result<Reservation<'_>, ConnectError> {
        let Some(claim) = self.registry.claim_cleanup(identity) else {
            return Err(duplicate_identity(identity));
        };

        match bounded(self.storage_timeout, self.repository.remove_user(identity)).await {
            Ok(()) => {
                tracing::info!(
                    "Removed stale row of '{}' in room '{}' before re-registration",
                    identity.username(),
                    identity.room()
                );
                Ok(claim.into_reservation())
            }
            Err(e) => {
                tracing::error!(
                    "Failed to remove stale row of '{}' in room '{}': {}",
                    identity.username(),
                    identity.room(),
                    e
                );
                Err(ConnectError::Storage(e))
            }
        }
    }

    async fn persist(&self, identity: &Identity) -> Result<(), RepositoryError> {
        self.repository.ensure_room_exists(identity.room()).await?;
        self.repository.add_user(identity).await
    }

    /// ストレージ失敗を ConnectError に変換する
    ///
    /// タイムアウト時は書き込みが確定済みの可能性があるため、スロットを解放する前に
    /// 行の削除を試みる。
    async fn fail_registration(&self, identity: &Identity, error: RepositoryError) -> ConnectError {
        match error {
            RepositoryError::DuplicateUser { .. } => {
                tracing::warn!(
                    "Storage already holds '{}' in room '{}'",
                    identity.username(),
                    identity.room()
                );
                duplicate_identity(identity)
            }
            RepositoryError::Timeout => {
                tracing::error!(
                    "Storage timed out while registering '{}' in room '{}'",
                    identity.username(),
                    identity.room()
                );
                if let Err(e) =
                    bounded(self.storage_timeout, self.repository.remove_user(identity)).await
                {
                    tracing::error!("Failed to undo timed out registration: {}", e);
                }
                ConnectError::Storage(RepositoryError::Timeout)
            }
            other => {
                tracing::error!(
                    "Failed to persist '{}' in room '{}': {}",
                    identity.username(),
                    identity.room(),
                    other
                );
                ConnectError::Storage(other)
            }
        }
    }
}

fn duplicate_identity(identity: &Identity) -> ConnectError {
    ConnectError::DuplicateIdentity {
        username: identity.username().to_string(),
        room: identity.room().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            ChatMessage, RoomName, RoomOccupancy, ValueObjectError,
            repository::MockChatRepository,
        },
        infrastructure::{
            message_pusher::WebSocketMessagePusher, repository::InMemoryChatRepository,
        },
    };
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    const STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

    struct Fixture {
        registry: Arc<RoomRegistry>,
        repository: Arc<InMemoryChatRepository>,
        message_pusher: Arc<WebSocketMessagePusher>,
        usecase: Arc<ConnectParticipantUseCase>,
    }

    fn create_fixture() -> Fixture {
        let registry = Arc::new(RoomRegistry::new());
        let repository = Arc::new(InMemoryChatRepository::new());
        let message_pusher = Arc::new(WebSocketMessagePusher::new());
        let usecase = Arc::new(ConnectParticipantUseCase::new(
            registry.clone(),
            repository.clone(),
            message_pusher.clone(),
            STORAGE_TIMEOUT,
        ));
        Fixture {
            registry,
            repository,
            message_pusher,
            usecase,
        }
    }

    fn create_usecase_with_repository(
        registry: Arc<RoomRegistry>,
        repository: Arc<dyn ChatRepository>,
        storage_timeout: Duration,
    ) -> ConnectParticipantUseCase {
        ConnectParticipantUseCase::new(
            registry,
            repository,
            Arc::new(WebSocketMessagePusher::new()),
            storage_timeout,
        )
    }

    fn channel() -> PusherChannel {
        let (tx, _rx) = mpsc::unbounded_channel::<OutboundFrame>();
        tx
    }

    fn identity(credentials: &str) -> Identity {
        Identity::from_credentials(credentials).unwrap()
    }

    #[tokio::test]
    async fn test_connect_participant_success() {
        // テスト項目: 新規ユーザーがレジストリ・ストレージ・Pusher に登録される
        // given (前提条件):
        let fixture = create_fixture();

        // when (操作):
        let result = fixture
            .usecase
            .execute(ConnectionId::generate(), "alice:1", channel())
            .await;

        // then (期待する結果):
        assert_eq!(result, Ok(identity("alice:1")));
        assert!(fixture.registry.contains(&identity("alice:1")));
        let state = fixture.repository.current_state().await.unwrap();
        assert_eq!(state[0].users[0].as_str(), "alice");
        assert_eq!(fixture.message_pusher.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_registration_success_is_first_frame() {
        // テスト項目: 登録成功の応答は、直後のブロードキャストより先に届く
        // given (前提条件):
        let fixture = create_fixture();
        let (tx, mut rx) = mpsc::unbounded_channel::<OutboundFrame>();

        // when (操作):
        let alice = fixture
            .usecase
            .execute(ConnectionId::generate(), "alice:1", tx)
            .await
            .unwrap();
        fixture
            .message_pusher
            .broadcast(alice.room(), "alice : 1 : hi")
            .await;

        // then (期待する結果):
        assert_eq!(
            rx.try_recv(),
            Ok(OutboundFrame::Text(REGISTRATION_SUCCESS.to_string()))
        );
        assert_eq!(
            rx.try_recv(),
            Ok(OutboundFrame::Text("alice : 1 : hi".to_string()))
        );
    }

    #[tokio::test]
    async fn test_connect_participant_duplicate_error() {
        // テスト項目: 同じルームで同じユーザー名の登録は DuplicateIdentity になる
        // given (前提条件):
        let fixture = create_fixture();
        fixture
            .usecase
            .execute(ConnectionId::generate(), "alice:1", channel())
            .await
            .unwrap();

        // when (操作):
        let result = fixture
            .usecase
            .execute(ConnectionId::generate(), "alice:1", channel())
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ConnectError::DuplicateIdentity {
                username: "alice".to_string(),
                room: "1".to_string(),
            })
        );
        assert_eq!(fixture.message_pusher.connection_count().await, 1);
    }

    #[tokio::test]
    async fn test_connect_participant_malformed_credentials() {
        // テスト項目: 不正な資格情報はレジストリ・ストレージを変更せずに拒否される
        // given (前提条件):
        let fixture = create_fixture();

        // when (操作):
        let result = fixture
            .usecase
            .execute(ConnectionId::generate(), "nocolonhere", channel())
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ConnectError::MalformedCredentials(
                ValueObjectError::MalformedCredentials
            ))
        );
        assert!(fixture.repository.rooms().await.is_empty());
        assert!(fixture.repository.current_state().await.unwrap().is_empty());
        assert!(
            fixture
                .registry
                .members_of(&RoomName::new("nocolonhere".to_string()).unwrap())
                .is_empty()
        );
        assert_eq!(fixture.message_pusher.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_storage_failure_rolls_back_registry() {
        // テスト項目: add_user の失敗時、レジストリに名前が残らない（ロールバック）
        // given (前提条件):
        let registry = Arc::new(RoomRegistry::new());
        let mut repository = MockChatRepository::new();
        repository.expect_ensure_room_exists().returning(|_| Ok(()));
        repository
            .expect_add_user()
            .times(1)
            .returning(|_| Err(RepositoryError::Storage("disk I/O error".to_string())));
        let usecase =
            create_usecase_with_repository(registry.clone(), Arc::new(repository), STORAGE_TIMEOUT);

        // when (操作):
        let result = usecase
            .execute(ConnectionId::generate(), "alice:1", channel())
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ConnectError::Storage(RepositoryError::Storage(
                "disk I/O error".to_string()
            )))
        );
        assert!(!registry.contains(&identity("alice:1")));
    }

    #[tokio::test]
    async fn test_storage_duplicate_is_reported_as_duplicate_identity() {
        // テスト項目: レジストリは空きでもストレージが重複と判定した場合は DuplicateIdentity
        // given (前提条件):
        let registry = Arc::new(RoomRegistry::new());
        let mut repository = MockChatRepository::new();
        repository.expect_ensure_room_exists().returning(|_| Ok(()));
        repository.expect_add_user().returning(|identity| {
            Err(RepositoryError::DuplicateUser {
                username: identity.username().to_string(),
                room: identity.room().to_string(),
            })
        });
        let usecase =
            create_usecase_with_repository(registry.clone(), Arc::new(repository), STORAGE_TIMEOUT);

        // when (操作):
        let result = usecase
            .execute(ConnectionId::generate(), "alice:1", channel())
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(ConnectError::DuplicateIdentity { .. })));
        assert!(!registry.contains(&identity("alice:1")));
    }

    #[tokio::test]
    async fn test_ensure_room_failure_skips_add_user() {
        // テスト項目: ルーム作成に失敗した場合は add_user を呼ばずに失敗する
        // given (前提条件):
        let registry = Arc::new(RoomRegistry::new());
        let mut repository = MockChatRepository::new();
        repository
            .expect_ensure_room_exists()
            .returning(|_| Err(RepositoryError::Storage("locked".to_string())));
        repository.expect_add_user().never();
        let usecase =
            create_usecase_with_repository(registry.clone(), Arc::new(repository), STORAGE_TIMEOUT);

        // when (操作):
        let result = usecase
            .execute(ConnectionId::generate(), "alice:1", channel())
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(ConnectError::Storage(_))));
        assert!(!registry.contains(&identity("alice:1")));
    }

    /// add_user が返ってこないストレージ
    struct StalledRepository {
        inner: InMemoryChatRepository,
    }

    #[async_trait]
    impl ChatRepository for StalledRepository {
        async fn ensure_room_exists(&self, room: &RoomName) -> Result<(), RepositoryError> {
            self.inner.ensure_room_exists(room).await
        }

        async fn add_user(&self, _identity: &Identity) -> Result<(), RepositoryError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }

        async fn remove_user(&self, identity: &Identity) -> Result<(), RepositoryError> {
            self.inner.remove_user(identity).await
        }

        async fn save_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
            self.inner.save_message(message).await
        }

        async fn current_state(&self) -> Result<Vec<RoomOccupancy>, RepositoryError> {
            self.inner.current_state().await
        }

        async fn clear_users(&self) -> Result<u64, RepositoryError> {
            self.inner.clear_users().await
        }
    }

    #[tokio::test]
    async fn test_unreachable_storage_fails_fast() {
        // テスト項目: ストレージが応答しない場合、タイムアウトで失敗しスロットは解放される
        // given (前提条件):
        let registry = Arc::new(RoomRegistry::new());
        let repository = Arc::new(StalledRepository {
            inner: InMemoryChatRepository::new(),
        });
        let usecase =
            create_usecase_with_repository(registry.clone(), repository, Duration::from_millis(50));

        // when (操作):
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            usecase.execute(ConnectionId::generate(), "alice:1", channel()),
        )
        .await
        .expect("registration should not hang");

        // then (期待する結果):
        assert_eq!(result, Err(ConnectError::Storage(RepositoryError::Timeout)));
        assert!(!registry.contains(&identity("alice:1")));
    }

    #[tokio::test]
    async fn test_concurrent_registration_single_winner() {
        // テスト項目: 同一 (username, room) の同時登録は 1 件成功・残りは DuplicateIdentity
        // given (前提条件):
        let fixture = create_fixture();
        let attempts = 20;

        // when (操作):
        let handles: Vec<_> = (0..attempts)
            .map(|_| {
                let usecase = fixture.usecase.clone();
                tokio::spawn(async move {
                    usecase
                        .execute(ConnectionId::generate(), "alice:1", channel())
                        .await
                })
            })
            .collect();
        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        // then (期待する結果):
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let duplicates = results
            .iter()
            .filter(|r| matches!(r, Err(ConnectError::DuplicateIdentity { .. })))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(duplicates, attempts - 1);
        assert_eq!(fixture.repository.current_state().await.unwrap()[0].users.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_cleanup_slot_is_taken_over() {
        // テスト項目: 削除待ちのスロットは、残った行を削除してから再登録できる
        // given (前提条件):
        let registry = Arc::new(RoomRegistry::new());
        let alice = identity("alice:1");
        registry.register(&alice).unwrap();
        registry.mark_pending_cleanup(&alice);
        let mut repository = MockChatRepository::new();
        repository.expect_remove_user().times(1).returning(|_| Ok(()));
        repository.expect_ensure_room_exists().returning(|_| Ok(()));
        repository.expect_add_user().times(1).returning(|_| Ok(()));
        let usecase =
            create_usecase_with_repository(registry.clone(), Arc::new(repository), STORAGE_TIMEOUT);

        // when (操作):
        let result = usecase
            .execute(ConnectionId::generate(), "alice:1", channel())
            .await;

        // then (期待する結果):
        assert_eq!(result, Ok(alice.clone()));
        assert!(!registry.is_pending_cleanup(&alice));
        assert_eq!(registry.members_of(alice.room()).len(), 1);
    }

    #[tokio::test]
    async fn test_pending_cleanup_failure_keeps_slot_pending() {
        // テスト項目: 残った行の削除に失敗した場合は登録失敗となり、スロットは削除待ちのまま
        // given (前提条件):
        let registry = Arc::new(RoomRegistry::new());
        let alice = identity("alice:1");
        registry.register(&alice).unwrap();
        registry.mark_pending_cleanup(&alice);
        let mut repository = MockChatRepository::new();
        repository
            .expect_remove_user()
            .times(1)
            .returning(|_| Err(RepositoryError::Storage("database is locked".to_string())));
        repository.expect_add_user().never();
        let usecase =
            create_usecase_with_repository(registry.clone(), Arc::new(repository), STORAGE_TIMEOUT);

        // when (操作):
        let result = usecase
            .execute(ConnectionId::generate(), "alice:1", channel())
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(ConnectError::Storage(RepositoryError::Storage(
                "database is locked".to_string()
            )))
        );
        assert!(registry.is_pending_cleanup(&alice));
    }
}
