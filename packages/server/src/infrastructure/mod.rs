//! Infrastructure layer: persistence, message pushing and DTOs.

pub mod dto;
pub mod message_pusher;
pub mod repository;
