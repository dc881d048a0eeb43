use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{PositionProvider, ProviderError};

pub const PATH_SEPARATOR: char = '|';
const STATE_SEPARATOR: char = '/';

/// In-memory position source driven by device activations.
///
/// The trail is kept as `device/state|device/state|...`, newest last. The
/// hider is in the room owning the device of the most recent entry.
#[derive(Debug, Default)]
pub struct PathTracker {
    devices: HashMap<String, String>,
    path: RwLock<String>,
}

impl PathTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices<I, D, R>(devices: I) -> Self
    where
        I: IntoIterator<Item = (D, R)>,
        D: Into<String>,
        R: Into<String>,
    {
        Self {
            devices: devices
                .into_iter()
                .map(|(device, room)| (device.into(), room.into()))
                .collect(),
            path: RwLock::new(String::new()),
        }
    }

    /// Parses `device=room` pairs as given on the command line.
    pub fn parse_devices(list: &str) -> Result<Self, ProviderError> {
        let mut devices = HashMap::new();
        for pair in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((device, room)) = pair.split_once('=') else {
                return Err(ProviderError::UnknownDevice(pair.to_string()));
            };
            devices.insert(device.trim().to_string(), room.trim().to_string());
        }
        Ok(Self {
            devices,
            path: RwLock::new(String::new()),
        })
    }

    pub async fn activate(&self, device: &str) -> Result<(), ProviderError> {
        self.record(device, "On").await
    }

    pub async fn record(&self, device: &str, state: &str) -> Result<(), ProviderError> {
        if !self.devices.contains_key(device) {
            return Err(ProviderError::UnknownDevice(device.to_string()));
        }

        let mut path = self.path.write().await;
        if !path.is_empty() {
            path.push(PATH_SEPARATOR);
        }
        path.push_str(device);
        path.push(STATE_SEPARATOR);
        path.push_str(state);
        Ok(())
    }

    fn room_of_last_device(&self, path: &str) -> Option<&str> {
        let last = path.rsplit(PATH_SEPARATOR).next()?;
        let device = last.split(STATE_SEPARATOR).next()?;
        self.devices.get(device).map(String::as_str)
    }
}

#[async_trait]
impl PositionProvider for PathTracker {
    async fn list_rooms(&self) -> Result<Vec<String>, ProviderError> {
        let rooms: BTreeSet<&String> = self.devices.values().collect();
        Ok(rooms.into_iter().cloned().collect())
    }

    async fn begin_tracking(&self) -> Result<(), ProviderError> {
        self.path.write().await.clear();
        Ok(())
    }

    async fn current_path(&self) -> Result<String, ProviderError> {
        Ok(self.path.read().await.clone())
    }

    async fn current_room(&self) -> Result<String, ProviderError> {
        let path = self.path.read().await;
        if path.is_empty() {
            return Ok(String::new());
        }
        Ok(self
            .room_of_last_device(&path)
            .map(str::to_string)
            .unwrap_or_default())
    }
}
