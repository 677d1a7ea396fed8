//! SQLite Chat Repository 実装
//!
//! sqlx の `SqlitePool` を使った ChatRepository の実装。
//!
//! ```text
//! rooms(id, name UNIQUE)
//! users(id, username, room_id, UNIQUE(username, room_id))
//! messages(id, user_id, room_id, username, content, timestamp)
//! ```
//!
//! `messages` は送信者の username / room_id も保持するため、切断時に `users` の行を
//! 削除しても履歴の送信者は失われません。

use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::domain::{
    ChatMessage, ChatRepository, Identity, RepositoryError, RoomName, RoomOccupancy, Username,
};

const MIGRATIONS: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS rooms (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL,
        room_id INTEGER NOT NULL REFERENCES rooms(id),
        UNIQUE(username, room_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        room_id INTEGER NOT NULL REFERENCES rooms(id),
        username TEXT NOT NULL,
        content TEXT NOT NULL,
        timestamp INTEGER NOT NULL
    )
    "#,
];

/// SQLite Chat Repository 実装
#[derive(Debug, Clone)]
pub struct SqliteChatRepository {
    pool: SqlitePool,
}

impl SqliteChatRepository {
    /// `database_url`（例: `sqlite://chat_server.db`）に接続し、テーブルを作成する
    ///
    /// # Arguments
    ///
    /// * `database_url` - 接続先。ファイルが無ければ作成する
    /// * `acquire_timeout` - コネクション取得の待ち時間の上限
    pub async fn connect(
        database_url: &str,
        acquire_timeout: Duration,
    ) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(storage_error)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await
            .map_err(storage_error)?;

        Self::with_pool(pool).await
    }

    /// 単一コネクションのインメモリ SQLite（テスト用）
    pub async fn in_memory() -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(storage_error)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(storage_error)?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, RepositoryError> {
        let repository = Self { pool };
        repository.migrate().await?;
        Ok(repository)
    }

    async fn migrate(&self) -> Result<(), RepositoryError> {
        for migration in MIGRATIONS {
            sqlx::query(migration)
                .execute(&self.pool)
                .await
                .map_err(storage_error)?;
        }
        tracing::debug!("SQLite schema is up to date");
        Ok(())
    }

    /// 保存済みメッセージ件数
    pub async fn count_messages(&self) -> Result<i64, RepositoryError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error)
    }

    /// プールを閉じる
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn storage_error(error: sqlx::Error) -> RepositoryError {
    match error {
        sqlx::Error::PoolTimedOut => RepositoryError::Timeout,
        other => RepositoryError::Storage(other.to_string()),
    }
}

fn duplicate_user(identity: &Identity) -> RepositoryError {
    RepositoryError::DuplicateUser {
        username: identity.username().to_string(),
        room: identity.room().to_string(),
    }
}

#[async_trait]
impl ChatRepository for SqliteChatRepository {
    async fn ensure_room_exists(&self, room: &RoomName) -> Result<(), RepositoryError> {
        sqlx::query("INSERT OR IGNORE INTO rooms (name) VALUES (?)")
            .bind(room.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(())
    }

    async fn add_user(&self, identity: &Identity) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        sqlx::query("INSERT OR IGNORE INTO rooms (name) VALUES (?)")
            .bind(identity.room().as_str())
            .execute(&mut *tx)
            .await
            .map_err(storage_error)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO users (username, room_id)
            VALUES (?, (SELECT id FROM rooms WHERE name = ?))
            "#,
        )
        .bind(identity.username().as_str())
        .bind(identity.room().as_str())
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(duplicate_user(identity));
            }
            Err(e) => return Err(storage_error(e)),
        }

        tx.commit().await.map_err(storage_error)?;
        Ok(())
    }

    async fn remove_user(&self, identity: &Identity) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            DELETE FROM users
            WHERE username = ? AND room_id = (SELECT id FROM rooms WHERE name = ?)
            "#,
        )
        .bind(identity.username().as_str())
        .bind(identity.room().as_str())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn save_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages (user_id, room_id, username, content, timestamp)
            SELECT u.id, u.room_id, u.username, ?, ?
            FROM users u JOIN rooms r ON u.room_id = r.id
            WHERE u.username = ? AND r.name = ?
            "#,
        )
        .bind(message.content.as_str())
        .bind(message.timestamp.value())
        .bind(message.author.username().as_str())
        .bind(message.author.room().as_str())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::UserNotFound {
                username: message.author.username().to_string(),
                room: message.author.room().to_string(),
            });
        }
        Ok(())
    }

    async fn current_state(&self) -> Result<Vec<RoomOccupancy>, RepositoryError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT r.name, u.username
            FROM users u JOIN rooms r ON u.room_id = r.id
            ORDER BY u.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        let mut rooms: Vec<RoomOccupancy> = Vec::new();
        for (room, username) in rows {
            let room = RoomName::new(room)
                .map_err(|e| RepositoryError::Storage(format!("invalid room row: {}", e)))?;
            let username = Username::new(username)
                .map_err(|e| RepositoryError::Storage(format!("invalid user row: {}", e)))?;
            match rooms.iter_mut().find(|o| o.room == room) {
                Some(occupancy) => occupancy.users.push(username),
                None => rooms.push(RoomOccupancy::new(room, vec![username])),
            }
        }
        Ok(rooms)
    }

    async fn clear_users(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM users")
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;
        Ok(result.rows_affected())
    }
}
