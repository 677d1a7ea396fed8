//! WebSocket chat server implementation.

mod handler;
mod server;
mod session;
mod signal;
pub mod state;
pub mod worker_pool;

pub use server::Server;
pub use session::{ChatSession, ConnectionState};
pub use worker_pool::WorkerPool;
