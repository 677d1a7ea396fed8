//! Conversion logic between domain models and DTOs (Snapshot Serializer).

use roomchat_shared::protocol::{ConnectedUser, ServerStateMessage};

use crate::domain::ServerSnapshot;

// ========================================
// Domain → DTO
// ========================================

impl From<&ServerSnapshot> for ServerStateMessage {
    fn from(snapshot: &ServerSnapshot) -> Self {
        Self {
            connected_users: snapshot
                .users()
                .map(|(room, username)| ConnectedUser {
                    room: room.as_str().to_string(),
                    username: username.as_str().to_string(),
                })
                .collect(),
        }
    }
}

/// Serialize a snapshot into the JSON document sent for `GET_SERVER_STATE`.
pub fn server_state_json(snapshot: &ServerSnapshot) -> Result<String, serde_json::Error> {
    serde_json::to_string(&ServerStateMessage::from(snapshot))
}
