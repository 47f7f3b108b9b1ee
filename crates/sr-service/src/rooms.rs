//! Room membership state.
//!
//! The [`RoomStore`] is the single source of truth for which connections
//! belong to which rooms. It is owned exclusively by the router actor, so
//! none of the operations here need interior locking; serialization comes
//! from the actor mailbox.
//!
//! Store contract: `put` overwrites unconditionally, `get` reports absence
//! as a normal outcome, `delete` is a no-op when the id is absent. No
//! operation fails.

use std::collections::{HashMap, HashSet};

/// A session room: the set of patient connections and the set of doctor
/// connections signaling through it.
///
/// A room must never rest in the store with both sets empty; the router
/// deletes it the moment the last member is removed.
#[derive(Debug, Clone)]
pub struct Room {
    /// Patient connection ids.
    pub patients: HashSet<String>,
    /// Doctor connection ids.
    pub doctors: HashSet<String>,
    /// Creation timestamp (unix seconds).
    pub created_at: i64,
}

impl Room {
    /// Create a room with the creating patient as its sole member.
    #[must_use]
    pub fn for_patient(connection_id: impl Into<String>) -> Self {
        Self {
            patients: HashSet::from([connection_id.into()]),
            doctors: HashSet::new(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// True when both membership sets are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patients.is_empty() && self.doctors.is_empty()
    }
}

/// Mapping from room id to [`Room`].
#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: HashMap<String, Room>,
}

impl RoomStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional insert/overwrite. Returns the displaced room, if any.
    pub fn put(&mut self, room_id: impl Into<String>, room: Room) -> Option<Room> {
        self.rooms.insert(room_id.into(), room)
    }

    /// Look up a room. Absence is a normal outcome, not an error.
    #[must_use]
    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    /// Unconditional removal; no-op if absent.
    pub fn delete(&mut self, room_id: &str) -> Option<Room> {
        self.rooms.remove(room_id)
    }

    /// Ids of every room currently in the store.
    ///
    /// Collected up front so the disconnect scan can mutate the store while
    /// iterating. Order is unspecified.
    #[must_use]
    pub fn room_ids(&self) -> Vec<String> {
        self.rooms.keys().cloned().collect()
    }

    /// Number of rooms in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// True when no rooms exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
