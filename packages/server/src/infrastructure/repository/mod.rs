//! ChatRepository の実装
//!
//! - `inmemory`: プロセス内のテーブル（テスト、`--in-memory` 起動用）
//! - `sqlite`: sqlx + SQLite による永続化

pub mod inmemory;
pub mod sqlite;

pub use inmemory::InMemoryChatRepository;
pub use sqlite::SqliteChatRepository;
