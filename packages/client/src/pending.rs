//! Pending `GET_SERVER_STATE` requests.
//!
//! Replies carry no correlation id, so requests are answered in the order they
//! were sent: each JSON reply resolves the oldest request still waiting.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use roomchat_shared::protocol::ServerStateMessage;
use tokio::sync::oneshot;

use crate::error::ClientError;

type Waiters = VecDeque<oneshot::Sender<ServerStateMessage>>;

/// Table of requests waiting for a server state reply
#[derive(Debug, Clone, Default)]
pub struct PendingRequests {
    waiters: Arc<Mutex<Waiters>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request. Call before sending `GET_SERVER_STATE`.
    pub fn register(&self) -> PendingReply {
        let (tx, rx) = oneshot::channel();
        self.lock().push_back(tx);
        PendingReply { rx }
    }

    /// Hand `state` to the oldest live request.
    ///
    /// Returns the state back when nobody is waiting for it.
    pub fn resolve(&self, state: ServerStateMessage) -> Option<ServerStateMessage> {
        let mut waiters = self.lock();
        let mut state = state;
        while let Some(waiter) = waiters.pop_front() {
            // a waiter that already timed out returns the value
            match waiter.send(state) {
                Ok(()) => return None,
                Err(unclaimed) => state = unclaimed,
            }
        }
        Some(state)
    }

    /// Fail every waiting request (the connection is gone).
    pub fn cancel_all(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Waiters> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receiving side of one registered request
#[derive(Debug)]
pub struct PendingReply {
    rx: oneshot::Receiver<ServerStateMessage>,
}

impl PendingReply {
    /// Wait for the reply, failing after `limit`.
    pub async fn wait(self, limit: Duration) -> Result<ServerStateMessage, ClientError> {
        match tokio::time::timeout(limit, self.rx).await {
            Ok(Ok(state)) => Ok(state),
            Ok(Err(_)) => Err(ClientError::ConnectionError(
                "connection closed before the server state arrived".to_string(),
            )),
            Err(_) => Err(ClientError::Timeout("server state")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomchat_shared::protocol::ConnectedUser;

    fn state(room: &str, username: &str) -> ServerStateMessage {
        ServerStateMessage {
            connected_users: vec![ConnectedUser {
                room: room.to_string(),
                username: username.to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_reply_resolves_waiting_request() {
        // テスト項目: 登録済みのリクエストは応答で解決される
        // given (前提条件):
        let pending = PendingRequests::new();
        let reply = pending.register();

        // when (操作):
        let unclaimed = pending.resolve(state("1", "alice"));

        // then (期待する結果):
        assert_eq!(unclaimed, None);
        assert_eq!(
            reply.wait(Duration::from_secs(1)).await,
            Ok(state("1", "alice"))
        );
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_replies_resolve_in_request_order() {
        // テスト項目: 複数のリクエストは送信順に解決される
        // given (前提条件):
        let pending = PendingRequests::new();
        let first = pending.register();
        let second = pending.register();

        // when (操作):
        pending.resolve(state("1", "alice"));
        pending.resolve(state("2", "bob"));

        // then (期待する結果):
        assert_eq!(
            first.wait(Duration::from_secs(1)).await,
            Ok(state("1", "alice"))
        );
        assert_eq!(
            second.wait(Duration::from_secs(1)).await,
            Ok(state("2", "bob"))
        );
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        // テスト項目: 応答が来ない場合は Timeout で失敗する
        // given (前提条件):
        let pending = PendingRequests::new();
        let reply = pending.register();

        // when (操作):
        let result = reply.wait(Duration::from_millis(20)).await;

        // then (期待する結果):
        assert_eq!(result, Err(ClientError::Timeout("server state")));
    }

    #[tokio::test]
    async fn test_reply_skips_abandoned_request() {
        // テスト項目: タイムアウトで放棄されたリクエストは飛ばされ、次のリクエストが解決される
        // given (前提条件):
        let pending = PendingRequests::new();
        let abandoned = pending.register();
        let _ = abandoned.wait(Duration::from_millis(1)).await;
        let live = pending.register();

        // when (操作):
        let unclaimed = pending.resolve(state("1", "alice"));

        // then (期待する結果):
        assert_eq!(unclaimed, None);
        assert_eq!(
            live.wait(Duration::from_secs(1)).await,
            Ok(state("1", "alice"))
        );
    }

    #[test]
    fn test_unsolicited_reply_is_returned() {
        // テスト項目: 待っているリクエストが無い応答はそのまま返される
        // given (前提条件):
        let pending = PendingRequests::new();

        // when (操作):
        let unclaimed = pending.resolve(state("1", "alice"));

        // then (期待する結果):
        assert_eq!(unclaimed, Some(state("1", "alice")));
    }

    #[tokio::test]
    async fn test_cancel_all_fails_waiters() {
        // テスト項目: 接続断でキャンセルされたリクエストは ConnectionError になる
        // given (前提条件):
        let pending = PendingRequests::new();
        let reply = pending.register();

        // when (操作):
        pending.cancel_all();

        // then (期待する結果):
        assert!(matches!(
            reply.wait(Duration::from_secs(1)).await,
            Err(ClientError::ConnectionError(_))
        ));
    }
}
