//! The room registry: a singleton map from room name to `Room` (spec §3,
//! §4.4).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

use crate::room::Room;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CreateRoomError {
    #[error("Room name cannot be empty")]
    EmptyName,
    #[error("Room name already in use")]
    AlreadyExists,
    #[error("Server has reached its room limit")]
    RegistryFull,
}

/// One row of the `ListRooms` payload (spec §4.8): only rooms that have at
/// least one player are included.
#[derive(Debug, Serialize)]
pub struct RoomSummary {
    pub id: usize,
    pub name: String,
    pub players: u8,
}

pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
    max_rooms: usize,
    next_slot: AtomicUsize,
}

impl RoomRegistry {
    pub fn new(max_rooms: usize) -> Self {
        RoomRegistry {
            rooms: DashMap::new(),
            max_rooms,
            next_slot: AtomicUsize::new(0),
        }
    }

    pub fn create(&self, name: &str, owner: &str) -> Result<Arc<Room>, CreateRoomError> {
        if name.is_empty() {
            return Err(CreateRoomError::EmptyName);
        }
        if self.rooms.contains_key(name) {
            return Err(CreateRoomError::AlreadyExists);
        }
        if self.rooms.len() >= self.max_rooms {
            return Err(CreateRoomError::RegistryFull);
        }
        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
        let room = Arc::new(Room::new(name.to_string(), owner.to_string(), slot));
        self.rooms.insert(name.to_string(), room.clone());
        Ok(room)
    }

    pub fn find(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.get(name).map(|entry| entry.value().clone())
    }

    /// Always destroys the room, win/forfeit/abandon alike (spec §4.4:
    /// leaving a room ends it for both occupants).
    pub fn remove(&self, name: &str) {
        self.rooms.remove(name);
    }

    pub async fn list(&self) -> Vec<RoomSummary> {
        // Collect the `Arc<Room>` handles first so the shard guards from
        // `self.rooms.iter()` are all dropped before we await each room's
        // own lock -- holding a dashmap shard lock across an await point
        // here could deadlock against a caller that holds a room's `inner`
        // lock while touching this same shard.
        let rooms: Vec<Arc<Room>> = self.rooms.iter().map(|entry| entry.value().clone()).collect();

        let mut out = Vec::new();
        for room in rooms {
            let count = room.players_count().await;
            if count > 0 {
                out.push(RoomSummary {
                    id: room.slot,
                    name: room.name.clone(),
                    players: count,
                });
            }
        }
        out.sort_by_key(|r| r.id);
        out
    }

    pub fn list_json(rows: &[RoomSummary]) -> String {
        serde_json::to_string(rows).expect("RoomSummary list serializes infallibly")
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Snapshot of every room name, for the heartbeat sweep's paused-room
    /// timeout check.
    pub fn all_names(&self) -> Vec<String> {
        self.rooms.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_empty_name() {
        let registry = RoomRegistry::new(10);
        assert_eq!(
            registry.create("", "alice").unwrap_err(),
            CreateRoomError::EmptyName
        );
    }

    #[test]
    fn create_rejects_duplicate_name() {
        let registry = RoomRegistry::new(10);
        registry.create("room1", "alice").unwrap();
        assert_eq!(
            registry.create("room1", "bob").unwrap_err(),
            CreateRoomError::AlreadyExists
        );
    }

    #[test]
    fn create_enforces_capacity() {
        let registry = RoomRegistry::new(1);
        registry.create("room1", "alice").unwrap();
        assert_eq!(
            registry.create("room2", "bob").unwrap_err(),
            CreateRoomError::RegistryFull
        );
    }

    #[tokio::test]
    async fn list_omits_empty_rooms() {
        let registry = RoomRegistry::new(10);
        let room = registry.create("room1", "alice").unwrap();
        assert!(registry.list().await.is_empty());
        room.join("alice").await.unwrap();
        let listing = registry.list().await;
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].name, "room1");
        assert_eq!(listing[0].players, 1);
    }

    #[test]
    fn remove_destroys_room() {
        let registry = RoomRegistry::new(10);
        registry.create("room1", "alice").unwrap();
        registry.remove("room1");
        assert!(registry.find("room1").is_none());
    }
}
