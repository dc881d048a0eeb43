use std::sync::Arc;

use anyhow::Result;
use hidenseek::position::PositionProvider;
use hidenseek::{LobbySettings, Map, PathTracker, PlayerAgent, Role, Room};

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub bind_addr: String,
    pub name: String,
    pub role: Role,
    pub devices: Option<String>,
    pub floorplan: Option<String>,
    pub lobby: LobbySettings,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", hidenseek::DEFAULT_PORT),
            name: String::from("host"),
            role: Role::Seeker,
            devices: None,
            floorplan: None,
            lobby: LobbySettings::default(),
        }
    }
}

impl HostConfig {
    /// Builds the host's own participant. A hider starts with one room per
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
