use async_trait::async_trait;

use super::Lobby;
use crate::net::{ChannelError, GuessArgs, HostCommand, HostDispatch, encode_bool};

impl Lobby {
    /// Serves one host command read off a participant's connection.
    pub async fn handle_host_command(&self, target: &str, command: &str, argument: &str) -> String {
        match HostCommand::parse(command) {
            Some(command) => self.handle_host(target, command, argument).await,
            None => {
                log::debug!("ignoring unknown host command {:?}", command);
                String::new()
            }
        }
    }

    pub async fn handle_host(&self, target: &str, command: HostCommand, argument: &str) -> String {
        match command {
            HostCommand::EndGame => match self.end_game().await {
                Ok(()) => encode_bool(true),
                Err(e) => {
                    log::debug!("{} asked to end the game: {}", target.trim(), e);
                    String::new()
                }
            },
            HostCommand::Disconnect => encode_bool(self.disconnect(target).await),
            HostCommand::GetRemainingTime => self.remaining_secs().await.to_string(),
            HostCommand::GuessRoom => {
                let Some(guess) = GuessArgs::decode(argument) else {
                    log::debug!("malformed guess from {}: {:?}", target.trim(), argument);
                    return String::new();
                };
                match self.guess_room(target, &guess.hider, &guess.room).await {
                    Ok(hit) => encode_bool(hit),
                    Err(e) => {
                        log::warn!("guess by {} failed: {}", target.trim(), e);
                        String::new()
                    }
                }
            }
            HostCommand::ViewMaps => serde_json::to_string(&self.view_maps().await)
                .unwrap_or_default(),
            HostCommand::GetHiderPosition => match self.hider_location(argument).await {
                Ok(room) => serde_json::to_string(&room).unwrap_or_default(),
                Err(e) => {
                    log::warn!("position lookup for {} failed: {}", target.trim(), e);
                    String::new()
                }
            },
        }
    }
}

/// Host commands issued inside the hosting process skip the wire.
#[async_trait]
impl HostDispatch for Lobby {
    async fn host(
        &self,
        target: &str,
        command: HostCommand,
        argument: &str,
    ) -> Result<String, ChannelError> {
        Ok(self.handle_host(target, command, argument).await)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::lobby::{LobbyPhase, LobbySettings};
    use crate::map::{Map, Room};
    use crate::net::LocalDispatch;
    use crate::player::{PlayerAgent, Role};
    use crate::position::PathTracker;

    async fn lobby() -> (Lobby, Arc<PathTracker>, Arc<PlayerAgent>) {
        let tracker = Arc::new(PathTracker::with_devices([("pir-kitchen", "kitchen")]));
        let mut map = Map::new();
        map.add_room(Room::new("kitchen")).unwrap();
        let hider = PlayerAgent::hider("A", tracker.clone(), map);
        let settings = LobbySettings {
            hiding_secs: 0,
            tick_interval: Duration::from_secs(3600),
            ..Default::default()
        };
        let lobby = Lobby::new(
            settings,
            "A",
            Role::Hider,
            Arc::new(LocalDispatch::new(hider)),
        )
        .unwrap();

        let seeker = PlayerAgent::seeker("B");
        lobby
            .join("B", Arc::new(LocalDispatch::new(seeker.clone())))
            .await
            .unwrap();
        (lobby, tracker, seeker)
    }

    #[tokio::test]
    async fn test_unknown_command_is_empty() {
        let (lobby, _, _) = lobby().await;
        assert_eq!(lobby.handle_host_command("B", "Bogus", "").await, "");
        assert_eq!(
            lobby.handle_host_command("B", "GetRemainingTime", "").await,
            "0"
        );
    }

    #[tokio::test]
    async fn test_seeker_plays_through_the_host() {
        let (lobby, tracker, seeker) = lobby().await;
        assert_eq!(lobby.handle_host_command("B", "EndGame", "").await, "");

        lobby.start_game().await.unwrap();
        tracker.activate("pir-kitchen").await.unwrap();

        let maps = seeker.view_maps(&lobby).await.unwrap();
        assert_eq!(maps.keys().collect::<Vec<_>>(), vec!["A"]);

        let room = lobby
            .handle_host_command("B", "GetHiderPosition", "A")
            .await;
        assert_eq!(serde_json::from_str::<Room>(&room).unwrap().name, "kitchen");

        assert_eq!(lobby.handle_host_command("B", "GuessRoom", "kitchen").await, "");
        assert!(seeker.guess_room(&lobby, "A", "kitchen").await.unwrap());
        assert_eq!(seeker.score(), 10);
        assert_eq!(lobby.phase().await, LobbyPhase::Ended);

        let maps: HashMap<String, Map> =
            serde_json::from_str(&lobby.handle_host_command("B", "ViewMaps", "").await).unwrap();
        assert!(maps.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_by_name() {
        let (lobby, _, _) = lobby().await;
        assert_eq!(lobby.handle_host_command("B", "Disconnect", "").await, "true");
        assert_eq!(lobby.handle_host_command("B", "Disconnect", "").await, "false");
        assert_eq!(lobby.participants().await.len(), 1);
    }
}
