//! Text frames exchanged between the chat server and its clients.
//!
//! ```text
//! client -> server (unregistered)  "<username>:<room>"
//! client -> server (registered)    "GET_SERVER_STATE" | <chat payload>
//! server -> client                 "REGISTRATION_SUCCESS"
//!                                  "ERROR: <reason>" followed by a close frame
//!                                  {"connected_users":[{"room":..,"username":..}]}
//!                                  "<username> : <room> : <content>"
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Separator between username and room in registration credentials
pub const CREDENTIALS_SEPARATOR: char = ':';

/// Command requesting a snapshot of all connected users
pub const GET_SERVER_STATE: &str = "GET_SERVER_STATE";

/// Reply sent after a successful registration
pub const REGISTRATION_SUCCESS: &str = "REGISTRATION_SUCCESS";

/// Prefix of every error reply
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Snapshot of connected users, sent in reply to `GET_SERVER_STATE`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStateMessage {
    pub connected_users: Vec<ConnectedUser>,
}

/// One connected user in a [`ServerStateMessage`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedUser {
    pub room: String,
    pub username: String,
}

impl ServerStateMessage {
    /// Group users by room, keeping the order in which they appear in the snapshot.
    pub fn rooms(&self) -> Vec<(&str, Vec<&str>)> {
        let mut rooms: Vec<(&str, Vec<&str>)> = Vec::new();
        for user in &self.connected_users {
            match rooms.iter_mut().find(|(room, _)| *room == user.room) {
                Some((_, users)) => users.push(user.username.as_str()),
                None => rooms.push((user.room.as_str(), vec![user.username.as_str()])),
            }
        }
        rooms.sort_by(|(a, _), (b, _)| compare_room_names(a, b));
        rooms
    }
}

/// Build the registration credentials frame.
pub fn credentials(username: &str, room: &str) -> String {
    format!("{}{}{}", username, CREDENTIALS_SEPARATOR, room)
}

/// Build an error reply frame.
pub fn error_reply(reason: &str) -> String {
    format!("{}{}", ERROR_PREFIX, reason)
}

/// Extract the reason from an error reply, if `text` is one.
pub fn parse_error_reply(text: &str) -> Option<&str> {
    text.strip_prefix(ERROR_PREFIX)
}

/// Build the fan-out frame for a chat message.
pub fn chat_line(username: &str, room: &str, content: &str) -> String {
    format!("{} : {} : {}", username, room, content)
}

/// Whether `text` is the `GET_SERVER_STATE` command.
///
/// Surrounding whitespace is ignored.
pub fn is_server_state_request(text: &str) -> bool {
    text.trim() == GET_SERVER_STATE
}

/// Order room names numerically when both are numbers, lexicographically otherwise.
///
/// Numeric names sort before non-numeric ones, so `"1" < "2" < "10" < "lobby"`.
pub fn compare_room_names(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
