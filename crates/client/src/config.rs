use std::sync::Arc;

use anyhow::Result;
use hidenseek::position::PositionProvider;
use hidenseek::{Map, PathTracker, PlayerAgent, Role, Room};

#[derive(Debug, Clone)]
pub struct GuestConfig {
    pub server_addr: String,
    pub name: String,
    pub role: Role,
    pub devices: Option<String>,
    pub floorplan: Option<String>,
}

impl Default for GuestConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", hidenseek::DEFAULT_PORT),
            name: String::from("guest"),
            role: Role::Seeker,
            devices: None,
            floorplan: None,
        }
    }
}

impl GuestConfig {
    /// Builds the local participant. A hider starts with one room per
    /// sensor room.
    pub async fn agent(&self) -> Result<(Arc<PlayerAgent>, Arc<PathTracker>)> {
        let tracker = Arc::new(match &self.devices {
            Some(devices) => PathTracker::parse_devices(devices)?,
            None => PathTracker::new(),
        });

        let agent = match self.role {
            Role::Seeker => PlayerAgent::seeker(&self.name),
            Role::Hider => {
                let mut map = match &self.floorplan {
                    Some(path) => Map::with_floorplan(path),
                    None => Map::new(),
                };
                for room in tracker.list_rooms().await? {
                    map.update_room(Room::new(room));
                }
                PlayerAgent::hider(&self.name, tracker.clone(), map)
            }
        };
        Ok((agent, tracker))
    }
}
