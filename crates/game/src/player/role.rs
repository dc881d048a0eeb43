use std::sync::Arc;

use async_trait::async_trait;

use super::Role;
use crate::map::{Map, Room};
use crate::position::{PositionProvider, ProviderError};

/// Role-specific behaviour of a participant's agent.
///
/// Defaults describe a participant with nothing to hide: it is never in the
/// guessed room and has no map or position to report.
#[async_trait]
pub trait RoleCapability: Send + Sync {
    fn role(&self) -> Role;

    /// Hiding phase has begun.
    async fn begin(&mut self) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn check_room(&mut self, _room: &str) -> Result<bool, ProviderError> {
        Ok(false)
    }

    async fn position(&self) -> Result<Option<Room>, ProviderError> {
        Ok(None)
    }

    fn map(&self) -> Option<&Map> {
        None
    }

    fn map_mut(&mut self) -> Option<&mut Map> {
        None
    }

    fn is_found(&self) -> bool {
        false
    }
}

pub struct Hider {
    provider: Arc<dyn PositionProvider>,
    map: Map,
    found: bool,
}

impl Hider {
    pub fn new(provider: Arc<dyn PositionProvider>, map: Map) -> Self {
        Self {
            provider,
            map,
            found: false,
        }
    }

    pub fn provider(&self) -> &Arc<dyn PositionProvider> {
        &self.provider
    }
}

#[async_trait]
impl RoleCapability for Hider {
    fn role(&self) -> Role {
        Role::Hider
    }

    async fn begin(&mut self) -> Result<(), ProviderError> {
        self.found = false;
        self.provider.begin_tracking().await
    }

    async fn check_room(&mut self, room: &str) -> Result<bool, ProviderError> {
        let current = self.provider.current_room().await?;
        let hit = !current.is_empty() && current == room.trim();
        if hit {
            self.found = true;
        }
        Ok(hit)
    }

    /// Rooms placed on the map keep their bounds; anything else is reported
    /// by name only.
    async fn position(&self) -> Result<Option<Room>, ProviderError> {
        let current = self.provider.current_room().await?;
        let room = self
            .map
            .room(&current)
            .cloned()
            .unwrap_or_else(|| Room::new(current));
        Ok(Some(room))
    }

    fn map(&self) -> Option<&Map> {
        Some(&self.map)
    }

    fn map_mut(&mut self) -> Option<&mut Map> {
        Some(&mut self.map)
    }

    fn is_found(&self) -> bool {
        self.found
    }
}

pub struct Seeker;

#[async_trait]
impl RoleCapability for Seeker {
    fn role(&self) -> Role {
        Role::Seeker
    }
}
