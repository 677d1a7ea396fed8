//! Data Transfer Objects (DTOs) for the chat server.
//!
//! The wire DTOs live in `roomchat_shared::protocol` so the client can decode
//! them; this module converts domain models into them.

pub mod conversion;

pub use conversion::server_state_json;

pub use roomchat_shared::protocol::{ConnectedUser, ServerStateMessage};
