//! Console client for the room-based chat server.

pub mod args;
pub mod domain;
pub mod error;
pub mod formatter;
pub mod pending;
pub mod runner;
pub mod session;
pub mod ui;

pub use args::{ClientArgs, ClientConfig};
pub use error::ClientError;
pub use runner::run_client;
