//! Console client for the room-based WebSocket chat server.
//!
//! Confirms the room (`-y` skips the question), registers as `username:room`, prints the users connected to every room and
//! then sends each typed line to the room. `list` prints the users again,
//! `exit` quits. Automatically reconnects on disconnection (max 5 attempts with
//! 5 second interval); a rejected registration exits with status 1.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin roomchat-client -- --username alice --room 1
//! cargo run --bin roomchat-client -- -n bob -r 2 -u ws://127.0.0.1:8081/chat
//! ```

use clap::Parser;
use roomchat_client::{ClientArgs, ClientConfig, run_client};
use roomchat_shared::logger::setup_logger;

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = ClientArgs::parse();
    let skip_room_confirmation = args.yes;
    let config = ClientConfig::from(args);

    // Run the client
    if let Err(e) = run_client(config, skip_room_confirmation).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
