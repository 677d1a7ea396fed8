//! Command-line arguments of the client.

use std::time::Duration;

use clap::Parser;

const MAX_ROOM_NUMBER: u32 = 20;

#[derive(Parser, Debug, Clone)]
#[command(name = "roomchat-client")]
#[command(about = "Console client for the room-based WebSocket chat server", long_about = None)]
pub struct ClientArgs {
    /// Username: letters optionally followed by digits (e.g. alice, bob42)
    #[arg(short = 'n', long, value_parser = parse_username)]
    pub username: String,

    /// Room number (1-20)
    #[arg(short = 'r', long, value_parser = parse_room)]
    pub room: String,

    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8081/chat")]
    pub url: String,

    /// Join the given room without asking for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Seconds to wait for a reply from the server
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    pub state_timeout_secs: u64,
}

/// Settings of one client run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub username: String,
    pub room: String,
    pub url: String,
    /// Bound for the registration reply and every `GET_SERVER_STATE` reply
    pub reply_timeout: Duration,
}

impl From<ClientArgs> for ClientConfig {
    fn from(args: ClientArgs) -> Self {
        Self {
            username: args.username,
            room: args.room,
            url: args.url,
            reply_timeout: Duration::from_secs(args.state_timeout_secs),
        }
    }
}

/// Letters followed by optional digits, nothing else.
fn parse_username(value: &str) -> Result<String, String> {
    let value = value.trim();
    let digits_start = value
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(value.len());
    let (letters, digits) = value.split_at(digits_start);

    let valid = !letters.is_empty()
        && letters.chars().all(|c| c.is_ascii_alphabetic())
        && digits.chars().all(|c| c.is_ascii_digit());
    if valid {
        Ok(value.to_string())
    } else {
        Err("expected letters optionally followed by digits".to_string())
    }
}

pub(crate) fn parse_room(value: &str) -> Result<String, String> {
    let value = value.trim();
    let in_range = !value.starts_with('0')
        && value
            .parse::<u32>()
            .is_ok_and(|number| (1..=MAX_ROOM_NUMBER).contains(&number));
    if in_range {
        Ok(value.to_string())
    } else {
        Err(format!("expected a room number from 1 to {}", MAX_ROOM_NUMBER))
    }
}
