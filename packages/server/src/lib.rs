//! Room-based WebSocket chat server.
//!
//! Clients register a `username:room` identity, exchange messages fanned out to
//! the other occupants of the same room, and may request a snapshot of every
//! connected user grouped by room.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
