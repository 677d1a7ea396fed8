//! Snapshot of connected users grouped by room.

use std::cmp::Ordering;

use roomchat_shared::protocol::compare_room_names;

use super::value_object::{RoomName, Username};

/// Users currently connected to one room, in registration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomOccupancy {
    pub room: RoomName,
    pub users: Vec<Username>,
}

impl RoomOccupancy {
    pub fn new(room: RoomName, users: Vec<Username>) -> Self {
        Self { room, users }
    }
}

/// Point-in-time listing of connected users with deterministic room order.
///
/// Rooms with numeric names are ordered numerically (`1, 2, 10`), other names
/// lexicographically after them. Users keep their order within a room. Rooms
/// without users are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerSnapshot {
    rooms: Vec<RoomOccupancy>,
}

impl ServerSnapshot {
    pub fn new(rooms: Vec<RoomOccupancy>) -> Self {
        let mut rooms: Vec<RoomOccupancy> = rooms
            .into_iter()
            .filter(|occupancy| !occupancy.users.is_empty())
            .collect();
        // stable sort: rooms reported twice keep their relative order
        rooms.sort_by(compare_occupancy);
        Self { rooms }
    }

    pub fn rooms(&self) -> &[RoomOccupancy] {
        &self.rooms
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Iterate over `(room, username)` pairs in snapshot order
    pub fn users(&self) -> impl Iterator<Item = (&RoomName, &Username)> {
        self.rooms
            .iter()
            .flat_map(|occupancy| occupancy.users.iter().map(move |user| (&occupancy.room, user)))
    }
}

fn compare_occupancy(a: &RoomOccupancy, b: &RoomOccupancy) -> Ordering {
    compare_room_names(a.room.as_str(), b.room.as_str())
}
