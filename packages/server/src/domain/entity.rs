//! Entities.

use roomchat_shared::protocol::{CREDENTIALS_SEPARATOR, chat_line};

use super::{
    error::ValueObjectError,
    value_object::{RoomName, Timestamp, Username},
};

/// The (username, room) pair bound to exactly one live connection.
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    username: Username,
    room: RoomName,
}

impl Identity {
    pub fn new(username: Username, room: RoomName) -> Self {
        Self { username, room }
    }

    /// Parse registration credentials of the form `"<username>:<room>"`.
    ///
    /// Exactly one separator is accepted; both parts are trimmed and must be
    /// non-empty.
    pub fn from_credentials(credentials: &str) -> Result<Self, ValueObjectError> {
        let mut parts = credentials.split(CREDENTIALS_SEPARATOR);
        let (Some(username), Some(room), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ValueObjectError::MalformedCredentials);
        };

        let username = Username::new(username.to_string())?;
        let room = RoomName::new(room.to_string())?;
        Ok(Self::new(username, room))
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    pub fn room(&self) -> &RoomName {
        &self.room
    }
}

/// A chat message sent by a registered identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub author: Identity,
    /// Payload exactly as received from the client
    pub content: String,
    /// Server-assigned timestamp
    pub timestamp: Timestamp,
}

impl ChatMessage {
    pub fn new(author: Identity, content: String, timestamp: Timestamp) -> Self {
        Self {
            author,
            content,
            timestamp,
        }
    }

    /// Frame delivered to every occupant of the author's room
    pub fn to_wire(&self) -> String {
        chat_line(
            self.author.username.as_str(),
            self.author.room.as_str(),
            &self.content,
        )
    }
}
