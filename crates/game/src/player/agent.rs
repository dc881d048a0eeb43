use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tokio::sync::{Mutex, broadcast};

use super::Role;
use super::role::{Hider, RoleCapability, Seeker};
use crate::event::{EventBus, PlayerEvent};
use crate::map::Map;
use crate::net::{
    ChannelError, GuessArgs, HostCommand, HostDispatch, RemoteCommand, decode_bool, encode_bool,
};
use crate::position::PositionProvider;

/// The in-process side of one participant.
///
/// Answers the host's remote commands for this participant, wherever the
/// host runs, and keeps the participant's own view of its score and state.
pub struct PlayerAgent {
    name: String,
    capability: Mutex<Box<dyn RoleCapability>>,
    score: AtomicU32,
    active: AtomicBool,
    events: EventBus<PlayerEvent>,
}

impl PlayerAgent {
    pub fn new(name: impl Into<String>, capability: Box<dyn RoleCapability>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into().trim().to_string(),
            capability: Mutex::new(capability),
            score: AtomicU32::new(0),
            active: AtomicBool::new(false),
            events: EventBus::default(),
        })
    }

    pub fn hider(
        name: impl Into<String>,
        provider: Arc<dyn PositionProvider>,
        map: Map,
    ) -> Arc<Self> {
        Self::new(name, Box::new(Hider::new(provider, map)))
    }

    pub fn seeker(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, Box::new(Seeker))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn score(&self) -> u32 {
        self.score.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub async fn role(&self) -> Role {
        self.capability.lock().await.role()
    }

    pub async fn is_found(&self) -> bool {
        self.capability.lock().await.is_found()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub async fn map(&self) -> Option<Map> {
        self.capability.lock().await.map().cloned()
    }

    /// Runs `edit` against this participant's map. Returns `None` when the
    /// participant has no map to edit.
    pub async fn edit_map<R>(&self, edit: impl FnOnce(&mut Map) -> R) -> Option<R> {
        let mut capability = self.capability.lock().await;
        capability.map_mut().map(edit)
    }

    /// Entry point for command names read off the wire.
    pub async fn handle_raw(&self, command: &str, argument: &str) -> String {
        match RemoteCommand::parse(command) {
            Some(command) => self.handle(command, argument).await,
            None => {
                log::debug!("{}: ignoring unknown command {:?}", self.name, command);
                String::new()
            }
        }
    }

    pub async fn handle(&self, command: RemoteCommand, argument: &str) -> String {
        match command {
            RemoteCommand::StartGame => {
                let hiding_secs = argument.trim().parse().unwrap_or(0);
                self.start_game(hiding_secs).await;
                String::new()
            }
            RemoteCommand::EndGame => {
                self.end_game();
                String::new()
            }
            RemoteCommand::GuessRoom => self.check_room(argument).await,
            RemoteCommand::AddPoints => match argument.trim().parse::<u32>() {
                Ok(points) => self.add_points(points).to_string(),
                Err(_) => String::new(),
            },
            RemoteCommand::GetMap => match self.capability.lock().await.map() {
                Some(map) => serde_json::to_string(map).unwrap_or_default(),
                None => String::new(),
            },
            RemoteCommand::GetPosition => {
                let position = self.capability.lock().await.position().await;
                match position {
                    Ok(Some(room)) => serde_json::to_string(&room).unwrap_or_default(),
                    Ok(None) => String::new(),
                    Err(e) => {
                        log::warn!("{}: position lookup failed: {}", self.name, e);
                        String::new()
                    }
                }
            }
        }
    }

    async fn start_game(&self, hiding_secs: u32) {
        if let Err(e) = self.capability.lock().await.begin().await {
            log::warn!("{}: could not start tracking: {}", self.name, e);
        }
        self.active.store(true, Ordering::SeqCst);
        self.events.publish(PlayerEvent::GameStarted { hiding_secs });
    }

    fn end_game(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.events.publish(PlayerEvent::GameEnded);
        }
    }

    /// Empty when this participant has nothing to hide.
    async fn check_room(&self, room: &str) -> String {
        let mut capability = self.capability.lock().await;
        if capability.role() != Role::Hider {
            return String::new();
        }
        let already_found = capability.is_found();
        match capability.check_room(room).await {
            Ok(hit) => {
                if hit && !already_found {
                    log::info!("{} was found in {}", self.name, room.trim());
                    self.events.publish(PlayerEvent::Found);
                }
                encode_bool(hit)
            }
            Err(e) => {
                log::warn!("{}: room check failed: {}", self.name, e);
                String::new()
            }
        }
    }

    /// Non-positive awards are ignored; returns the new total.
    pub fn add_points(&self, points: u32) -> u32 {
        if points == 0 {
            return self.score();
        }
        let total = self.score.fetch_add(points, Ordering::SeqCst) + points;
        self.events
            .publish(PlayerEvent::PointsAwarded { points, total });
        total
    }

    /// Local cleanup once the link to the host is gone.
    pub fn connection_lost(&self) {
        self.active.store(false, Ordering::SeqCst);
        log::warn!("{}: connection lost", self.name);
        self.events.publish(PlayerEvent::ConnectionLost);
    }

    /// Guess, as this participant, where `hider` is hiding.
    pub async fn guess_room(
        &self,
        host: &dyn HostDispatch,
        hider: &str,
        room: &str,
    ) -> Result<bool, ChannelError> {
        let argument = GuessArgs::new(hider, room).encode();
        let reply = host
            .host(&self.name, HostCommand::GuessRoom, &argument)
            .await?;
        Ok(decode_bool(&reply).unwrap_or(false))
    }

    /// Maps of every hider not found yet, keyed by hider.
    pub async fn view_maps(
        &self,
        host: &dyn HostDispatch,
    ) -> Result<HashMap<String, Map>, ChannelError> {
        let reply = host.host(&self.name, HostCommand::ViewMaps, "").await?;
        Ok(serde_json::from_str(&reply).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::map::Room;
    use crate::position::PathTracker;

    fn hider_in_house() -> (Arc<PlayerAgent>, Arc<PathTracker>) {
        let tracker = Arc::new(PathTracker::with_devices([
            ("pir-kitchen", "kitchen"),
            ("pir-hall", "hall"),
        ]));
        let mut map = Map::new();
        map.add_room(Room::new("kitchen")).unwrap();
        map.add_room(Room::new("hall")).unwrap();
        (PlayerAgent::hider("A", tracker.clone(), map), tracker)
    }

    #[tokio::test]
    async fn test_check_room_marks_found_once() {
        let (agent, tracker) = hider_in_house();
        let mut events = agent.subscribe();

        agent.handle(RemoteCommand::StartGame, "10").await;
        tracker.activate("pir-kitchen").await.unwrap();

        assert_eq!(agent.handle(RemoteCommand::GuessRoom, "hall").await, "false");
        assert!(!agent.is_found().await);
        assert_eq!(agent.handle(RemoteCommand::GuessRoom, "kitchen").await, "true");
        assert!(agent.is_found().await);

        assert_eq!(
            events.recv().await.unwrap(),
            PlayerEvent::GameStarted { hiding_secs: 10 }
        );
        assert_eq!(events.recv().await.unwrap(), PlayerEvent::Found);
    }

    #[tokio::test]
    async fn test_start_game_resets_trail() {
        let (agent, tracker) = hider_in_house();
        tracker.activate("pir-hall").await.unwrap();

        agent.handle_raw("StartGame", "30").await;

        assert!(agent.is_active());
        assert_eq!(tracker.current_path().await.unwrap(), "");
        let reply = agent.handle(RemoteCommand::GetPosition, "").await;
        let room: Room = serde_json::from_str(&reply).unwrap();
        assert!(room.is_unknown());
    }

    #[tokio::test]
    async fn test_points_and_bad_arguments() {
        let agent = PlayerAgent::seeker("B");
        assert_eq!(agent.handle(RemoteCommand::AddPoints, "10").await, "10");
        assert_eq!(agent.handle(RemoteCommand::AddPoints, "0").await, "10");
        assert_eq!(agent.handle(RemoteCommand::AddPoints, "-3").await, "");
        assert_eq!(agent.handle(RemoteCommand::AddPoints, "lots").await, "");
        assert_eq!(agent.score(), 10);
        assert_eq!(agent.handle_raw("Bogus", "").await, "");
    }

    #[tokio::test]
    async fn test_seeker_has_nothing_to_reveal() {
        let agent = PlayerAgent::seeker("B");
        assert_eq!(agent.handle(RemoteCommand::GetMap, "").await, "");
        assert_eq!(agent.handle(RemoteCommand::GetPosition, "").await, "");
        assert_eq!(agent.handle(RemoteCommand::GuessRoom, "kitchen").await, "");
        assert!(agent.edit_map(|map| map.reset()).await.is_none());
    }

    #[tokio::test]
    async fn test_map_snapshot_reflects_edits() {
        let (agent, _) = hider_in_house();
        agent
            .edit_map(|map| map.remove_room("hall"))
            .await
            .unwrap()
            .unwrap();

        let reply = agent.handle(RemoteCommand::GetMap, "").await;
        let map: Map = serde_json::from_str(&reply).unwrap();
        assert_eq!(map.room_names().collect::<Vec<_>>(), vec!["kitchen"]);
    }

    struct RecordingHost {
        calls: std::sync::Mutex<Vec<(String, HostCommand, String)>>,
    }

    #[async_trait]
    impl HostDispatch for RecordingHost {
        async fn host(
            &self,
            target: &str,
            command: HostCommand,
            argument: &str,
        ) -> Result<String, ChannelError> {
            self.calls
                .lock()
                .unwrap()
                .push((target.to_string(), command, argument.to_string()));
            Ok(match command {
                HostCommand::GuessRoom => "true".to_string(),
                _ => String::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_seeker_forwards_as_itself() {
        let host = RecordingHost {
            calls: std::sync::Mutex::new(Vec::new()),
        };
        let agent = PlayerAgent::seeker("B");

        assert!(agent.guess_room(&host, "A", "kitchen").await.unwrap());
        assert!(agent.view_maps(&host).await.unwrap().is_empty());

        let calls = host.calls.lock().unwrap();
        assert_eq!(calls[0].0, "B");
        assert_eq!(calls[0].1, HostCommand::GuessRoom);
        assert_eq!(
            GuessArgs::decode(&calls[0].2),
            Some(GuessArgs::new("A", "kitchen"))
        );
        assert_eq!(calls[1].1, HostCommand::ViewMaps);
    }
}
