//! Room Registry
//!
//! Process-wide mapping `room -> usernames` currently holding a slot.
//! Each room owns its own lock: mutations to the same room are mutually
//! exclusive, mutations to different rooms proceed concurrently. The outer map
//! is only write-locked the first time a room is seen.
//!
//! Registration is split into `reserve` (atomic check-then-insert) and
//! `Reservation::commit`. A reservation dropped without commit releases the slot,
//! which is the compensating rollback when persistence fails.
//!
//! A slot whose owner disconnected while the storage row could not be removed is
//! kept as *pending cleanup*. Whoever removes the row first (the disconnect retry
//! or the next registration of the same name) takes a [`CleanupClaim`] on it.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
};

use super::{
    entity::Identity,
    error::RegistryError,
    value_object::{RoomName, Username},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// 登録中または登録済み
    Held,
    /// 切断済みだがストレージの行が残っている
    PendingCleanup,
    /// ストレージの行を削除中
    CleaningUp,
}

type RoomMembers = Arc<Mutex<BTreeMap<Username, Slot>>>;

/// Concurrent room membership registry
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomName, RoomMembers>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `identity` if its username is free in its room.
    ///
    /// The slot stays taken while the returned [`Reservation`] is alive and is
    /// released when it is dropped without [`Reservation::commit`].
    pub fn reserve(&self, identity: &Identity) -> Result<Reservation<'_>, RegistryError> {
        let room = self.room(identity.room());
        let mut members = lock(&room);
        match members.get(identity.username()) {
            None => {}
            Some(Slot::PendingCleanup) => {
                return Err(RegistryError::PendingCleanup {
                    username: identity.username().to_string(),
                    room: identity.room().to_string(),
                });
            }
            Some(Slot::Held | Slot::CleaningUp) => {
                return Err(RegistryError::DuplicateIdentity {
                    username: identity.username().to_string(),
                    room: identity.room().to_string(),
                });
            }
        }
        members.insert(identity.username().clone(), Slot::Held);

        Ok(Reservation {
            registry: self,
            identity: identity.clone(),
            committed: false,
        })
    }

    /// Reserve and immediately commit `identity`.
    pub fn register(&self, identity: &Identity) -> Result<(), RegistryError> {
        self.reserve(identity).map(Reservation::commit)
    }

    /// Remove `identity` from its room. Removing an absent member is a no-op.
    ///
    /// Returns whether the member was present.
    pub fn unregister(&self, identity: &Identity) -> bool {
        let Some(room) = self.existing_room(identity.room()) else {
            return false;
        };
        lock(&room).remove(identity.username()).is_some()
    }

    /// Keep the slot of a departed `identity` until its storage row is removed.
    ///
    /// Returns whether the member was present.
    pub fn mark_pending_cleanup(&self, identity: &Identity) -> bool {
        self.transition(identity, Slot::Held, Slot::PendingCleanup)
    }

    /// Take the exclusive right to remove the storage row of a pending slot.
    ///
    /// Returns `None` when the slot is not pending cleanup (already released,
    /// claimed by someone else, or held by a live connection).
    pub fn claim_cleanup(&self, identity: &Identity) -> Option<CleanupClaim<'_>> {
        self.transition(identity, Slot::PendingCleanup, Slot::CleaningUp)
            .then(|| CleanupClaim {
                registry: self,
                identity: identity.clone(),
                settled: false,
            })
    }

    /// Whether `identity` is waiting for its storage row to be removed.
    pub fn is_pending_cleanup(&self, identity: &Identity) -> bool {
        self.slot(identity) == Some(Slot::PendingCleanup)
    }

    /// Point-in-time snapshot of the live usernames in `room`.
    ///
    /// Fan-out reads the message pusher's own connection map; this accessor is
    /// for diagnostics and tests.
    pub fn members_of(&self, room: &RoomName) -> BTreeSet<Username> {
        match self.existing_room(room) {
            Some(members) => lock(&members)
                .iter()
                .filter(|(_, slot)| **slot == Slot::Held)
                .map(|(username, _)| username.clone())
                .collect(),
            None => BTreeSet::new(),
        }
    }

    /// Whether `identity` currently holds a slot in any state. Diagnostic accessor.
    pub fn contains(&self, identity: &Identity) -> bool {
        self.slot(identity).is_some()
    }

    fn slot(&self, identity: &Identity) -> Option<Slot> {
        let room = self.existing_room(identity.room())?;
        lock(&room).get(identity.username()).copied()
    }

    fn transition(&self, identity: &Identity, from: Slot, to: Slot) -> bool {
        let Some(room) = self.existing_room(identity.room()) else {
            return false;
        };
        match lock(&room).get_mut(identity.username()) {
            Some(slot) if *slot == from => {
                *slot = to;
                true
            }
            _ => false,
        }
    }

    fn existing_room(&self, room: &RoomName) -> Option<RoomMembers> {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room)
            .cloned()
    }

    /// Get the member map of `room`, creating it on first use.
    fn room(&self, room: &RoomName) -> RoomMembers {
        if let Some(members) = self.existing_room(room) {
            return members;
        }
        self.rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(room.clone())
            .or_default()
            .clone()
    }
}

fn lock(members: &Mutex<BTreeMap<Username, Slot>>) -> MutexGuard<'_, BTreeMap<Username, Slot>> {
    members.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A claimed registry slot awaiting confirmation
#[derive(Debug)]
#[must_use = "dropping a reservation releases the slot"]
pub struct Reservation<'a> {
    registry: &'a RoomRegistry,
    identity: Identity,
    committed: bool,
}

impl Reservation<'_> {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Keep the slot.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry.unregister(&self.identity);
            tracing::debug!(
                "Released reservation for '{}' in room '{}'",
                self.identity.username(),
                self.identity.room()
            );
        }
    }
}

/// Exclusive right to remove the storage row behind a pending slot
///
/// Dropping the claim without settling it puts the slot back to pending cleanup.
#[derive(Debug)]
#[must_use = "dropping a cleanup claim leaves the slot pending"]
pub struct CleanupClaim<'a> {
    registry: &'a RoomRegistry,
    identity: Identity,
    settled: bool,
}

impl<'a> CleanupClaim<'a> {
    /// The row is gone: free the slot.
    pub fn release(mut self) {
        self.settled = true;
        self.registry.unregister(&self.identity);
    }

    /// The row is gone: hand the slot straight to a new registration.
    pub fn into_reservation(mut self) -> Reservation<'a> {
        self.settled = true;
        self.registry
            .transition(&self.identity, Slot::CleaningUp, Slot::Held);
        Reservation {
            registry: self.registry,
            identity: self.identity.clone(),
            committed: false,
        }
    }
}

impl Drop for CleanupClaim<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.registry
                .transition(&self.identity, Slot::CleaningUp, Slot::PendingCleanup);
        }
    }
}
