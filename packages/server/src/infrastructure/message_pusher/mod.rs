//! メッセージ送信（通知）の実装
//!
//! ## 実装
//!
//! - `websocket`: 接続ごとの送信チャンネル（WebSocket writer タスクへ繋がる）を使った実装

pub mod websocket;

pub use websocket::WebSocketMessagePusher;
