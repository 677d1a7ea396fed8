//! InMemory Chat Repository 実装
//!
//! ドメイン層が定義する ChatRepository trait の具体的な実装。
//! rooms / users / messages の 3 テーブルを Vec で保持し、
//! SQLite 実装と同じ一意制約 (username, room) を守ります。

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ChatMessage, ChatRepository, Identity, RepositoryError, RoomName, RoomOccupancy, Timestamp,
    Username,
};

/// 保存済みメッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub username: Username,
    pub room: RoomName,
    pub content: String,
    pub timestamp: Timestamp,
}

#[derive(Debug, Default)]
struct Tables {
    /// 作成順のルーム
    rooms: Vec<RoomName>,
    /// 追加順の接続中ユーザー
    users: Vec<Identity>,
    messages: Vec<StoredMessage>,
}

/// インメモリ Chat Repository 実装
#[derive(Debug, Default)]
pub struct InMemoryChatRepository {
    tables: Mutex<Tables>,
}

impl InMemoryChatRepository {
    /// 新しい InMemoryChatRepository を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存済みメッセージを全て取得
    pub async fn messages(&self) -> Vec<StoredMessage> {
        self.tables.lock().await.messages.clone()
    }

    /// 作成済みのルームを全て取得
    pub async fn rooms(&self) -> Vec<RoomName> {
        self.tables.lock().await.rooms.clone()
    }
}

impl Tables {
    fn ensure_room(&mut self, room: &RoomName) {
        if !self.rooms.contains(room) {
            self.rooms.push(room.clone());
        }
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn ensure_room_exists(&self, room: &RoomName) -> Result<(), RepositoryError> {
        self.tables.lock().await.ensure_room(room);
        Ok(())
    }

    async fn add_user(&self, identity: &Identity) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;
        if tables.users.contains(identity) {
            return Err(RepositoryError::DuplicateUser {
                username: identity.username().to_string(),
                room: identity.room().to_string(),
            });
        }
        tables.ensure_room(identity.room());
        tables.users.push(identity.clone());
        Ok(())
    }

    async fn remove_user(&self, identity: &Identity) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;
        tables.users.retain(|user| user != identity);
        Ok(())
    }

    async fn save_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains(&message.author) {
            return Err(RepositoryError::UserNotFound {
                username: message.author.username().to_string(),
                room: message.author.room().to_string(),
            });
        }
        tables.messages.push(StoredMessage {
            username: message.author.username().clone(),
            room: message.author.room().clone(),
            content: message.content.clone(),
            timestamp: message.timestamp,
        });
        Ok(())
    }

    async fn current_state(&self) -> Result<Vec<RoomOccupancy>, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut rooms: Vec<RoomOccupancy> = Vec::new();
        for user in &tables.users {
            match rooms.iter_mut().find(|o| &o.room == user.room()) {
                Some(occupancy) => occupancy.users.push(user.username().clone()),
                None => rooms.push(RoomOccupancy::new(
                    user.room().clone(),
                    vec![user.username().clone()],
                )),
            }
        }
        Ok(rooms)
    }

    async fn clear_users(&self) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let removed = tables.users.len() as u64;
        tables.users.clear();
        Ok(removed)
    }
}
