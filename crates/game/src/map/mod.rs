mod room;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use room::Room;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("room already on the map: {0}")]
    DuplicateRoom(String),
    #[error("room not on the map: {0}")]
    UnknownRoom(String),
}

/// The floorplan a hider hides in, keyed by room name.
///
/// Only the hiding side edits a map. Everyone else sees snapshots that
/// arrive as JSON through `GetMap`/`ViewMaps`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Map {
    #[serde(default)]
    floorplan: Option<String>,
    #[serde(default)]
    rooms: BTreeMap<String, Room>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_floorplan(path: impl Into<String>) -> Self {
        Self {
            floorplan: Some(path.into()),
            rooms: BTreeMap::new(),
        }
    }

    pub fn floorplan(&self) -> Option<&str> {
        self.floorplan.as_deref()
    }

    /// Switching floorplans invalidates every placed room.
    pub fn set_floorplan(&mut self, path: impl Into<String>) {
        self.rooms.clear();
        self.floorplan = Some(path.into());
    }

    pub fn add_room(&mut self, room: Room) -> Result<(), MapError> {
        if self.rooms.contains_key(&room.name) {
            return Err(MapError::DuplicateRoom(room.name));
        }
        self.rooms.insert(room.name.clone(), room);
        Ok(())
    }

    /// Inserts or replaces the room with the same name.
    pub fn update_room(&mut self, room: Room) {
        self.rooms.insert(room.name.clone(), room);
    }

    pub fn remove_room(&mut self, name: &str) -> Result<Room, MapError> {
        self.rooms
            .remove(name)
            .ok_or_else(|| MapError::UnknownRoom(name.to_string()))
    }

    pub fn reset(&mut self) {
        self.rooms.clear();
    }

    pub fn room(&self, name: &str) -> Option<&Room> {
        self.rooms.get(name)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn room_names(&self) -> impl Iterator<Item = &str> {
        self.rooms.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use glam::IVec2;

    use super::*;

    #[test]
    fn test_room_editing() {
        let mut map = Map::new();
        map.add_room(Room::new("kitchen")).unwrap();
        map.add_room(Room::new("hall")).unwrap();

        assert_eq!(
            map.add_room(Room::new("kitchen")),
            Err(MapError::DuplicateRoom("kitchen".to_string()))
        );

        map.update_room(Room::with_bounds("kitchen", IVec2::new(0, 0), IVec2::new(4, 3)));
        assert_eq!(map.room("kitchen").unwrap().area(), 12);
        assert_eq!(map.len(), 2);

        map.remove_room("hall").unwrap();
        assert!(map.remove_room("hall").is_err());
        assert_eq!(map.room_names().collect::<Vec<_>>(), vec!["kitchen"]);

        map.reset();
        assert!(map.is_empty());
    }

    #[test]
    fn test_floorplan_change_clears_rooms() {
        let mut map = Map::with_floorplan("ground.png");
        map.add_room(Room::new("attic")).unwrap();

        map.set_floorplan("first.png");
        assert_eq!(map.floorplan(), Some("first.png"));
        assert!(map.is_empty());
    }

    #[test]
    fn test_json_snapshot_keeps_rooms_and_bounds() {
        let mut map = Map::with_floorplan("house.png");
        map.add_room(Room::with_bounds("kitchen", IVec2::new(1, 2), IVec2::new(30, 40)))
            .unwrap();
        map.add_room(Room::new("cellar")).unwrap();

        let json = serde_json::to_string(&map).unwrap();
        assert!(!json.contains('\n'));

        let snapshot: Map = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot, map);
        assert_eq!(
            snapshot.room("kitchen").unwrap().bounds,
            [IVec2::new(1, 2), IVec2::new(30, 40)]
        );
    }
}
