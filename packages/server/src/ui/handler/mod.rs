//! HTTP and WebSocket handlers.

mod http;
mod websocket;

pub use http::{get_server_state, health_check};
pub use websocket::websocket_handler;
