//! Shared building blocks for the Roomchat server and client.
//!
//! - `protocol`: text frames exchanged over the WebSocket connection
//! - `logger`: tracing subscriber setup
//! - `time`: clock abstraction used for server-assigned timestamps

pub mod logger;
pub mod protocol;
pub mod time;
