mod commands;
mod participant;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard, broadcast, watch};
use tokio::task::JoinSet;
use tokio::time::{self, Instant};

use crate::event::{EventBus, LobbyEvent};
use crate::map::{Map, Room};
use crate::net::{ChannelError, Dispatch, RemoteCommand, decode_bool};
use crate::player::Role;

use participant::Participant;
pub use participant::ParticipantInfo;

pub type PlayerId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LobbyPhase {
    Idle,
    Hiding,
    Seeking,
    Ended,
}

impl LobbyPhase {
    /// A game is running: hiders are hiding or seekers are seeking.
    pub fn is_active(&self) -> bool {
        matches!(self, LobbyPhase::Hiding | LobbyPhase::Seeking)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LobbyPhase::Idle => "idle",
            LobbyPhase::Hiding => "hiding",
            LobbyPhase::Seeking => "seeking",
            LobbyPhase::Ended => "ended",
        }
    }
}

impl fmt::Display for LobbyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct LobbySettings {
    pub hiding_secs: u32,
    pub tick_interval: Duration,
    pub points_per_find: u32,
    pub handshake_timeout: Duration,
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            hiding_secs: 300,
            tick_interval: Duration::from_secs(1),
            points_per_find: 10,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("identifier {0:?} is already in use")]
    NameTaken(String),
    #[error("identifier must not be empty")]
    EmptyName,
    #[error("lobby has been disbanded")]
    Disbanded,
}

#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error("cannot {action} while the lobby is {phase}")]
    WrongPhase {
        action: &'static str,
        phase: LobbyPhase,
    },
    #[error("lobby has no host")]
    NoHost,
    #[error("no participant named {0:?}")]
    UnknownPlayer(String),
    #[error("{0} has no map and position to hide with")]
    CannotHide(String),
    #[error("lobby has been disbanded")]
    Disbanded,
    #[error("{name} is unreachable: {source}")]
    Unreachable {
        name: String,
        #[source]
        source: ChannelError,
    },
}

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Joined {
    pub id: PlayerId,
    pub remaining_secs: u32,
}

#[derive(Debug)]
struct LobbyState {
    phase: LobbyPhase,
    hiding_secs: u32,
    remaining_secs: u32,
    round: u64,
    participants: Vec<Participant>,
    host: Option<PlayerId>,
    next_id: PlayerId,
    disbanded: bool,
}

impl LobbyState {
    fn find(&self, name: &str) -> Option<&Participant> {
        let name = name.trim();
        self.participants.iter().find(|p| p.name == name)
    }

    fn get_mut(&mut self, id: PlayerId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    fn hidden_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_hidden()).count()
    }

    fn seeker_count(&self) -> usize {
        self.participants
            .iter()
            .filter(|p| p.role == Role::Seeker)
            .count()
    }

    fn targets(&self) -> Vec<Target> {
        self.participants.iter().map(Target::of).collect()
    }
}

/// Just enough of a participant to talk to it with no lock held.
struct Target {
    id: PlayerId,
    name: String,
    dispatch: Arc<dyn Dispatch>,
}

impl Target {
    fn of(participant: &Participant) -> Self {
        Self {
            id: participant.id,
            name: participant.name.clone(),
            dispatch: Arc::clone(&participant.dispatch),
        }
    }
}

struct Shared {
    settings: LobbySettings,
    state: RwLock<LobbyState>,
    guesses: Mutex<()>,
    events: EventBus<LobbyEvent>,
    disband: watch::Sender<bool>,
}

/// The authoritative session of one hosted game.
///
/// Every clone refers to the same session. State changes happen under one
/// lock that is never held while talking to a participant.
#[derive(Clone)]
pub struct Lobby {
    shared: Arc<Shared>,
}

impl Lobby {
    /// Creates the session with the host's own participant already in it.
    pub fn new(
        settings: LobbySettings,
        host_name: &str,
        host_role: Role,
        host_dispatch: Arc<dyn Dispatch>,
    ) -> Result<Self, JoinError> {
        let host_name = host_name.trim();
        if host_name.is_empty() {
            return Err(JoinError::EmptyName);
        }

        let mut host = Participant::new(1, host_name.to_string(), host_role, host_dispatch);
        host.is_host = true;

        let (disband, _) = watch::channel(false);
        let state = LobbyState {
            phase: LobbyPhase::Idle,
            hiding_secs: settings.hiding_secs,
            remaining_secs: 0,
            round: 0,
            participants: vec![host],
            host: Some(1),
            next_id: 2,
            disbanded: false,
        };

        log::info!("{} is hosting a lobby", host_name);
        Ok(Self {
            shared: Arc::new(Shared {
                settings,
                state: RwLock::new(state),
                guesses: Mutex::new(()),
                events: EventBus::default(),
                disband,
            }),
        })
    }

    pub fn settings(&self) -> &LobbySettings {
        &self.shared.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LobbyEvent> {
        self.shared.events.subscribe()
    }

    async fn read(&self) -> RwLockReadGuard<'_, LobbyState> {
        self.shared.state.read().await
    }

    async fn write(&self) -> RwLockWriteGuard<'_, LobbyState> {
        self.shared.state.write().await
    }

    fn publish(&self, event: LobbyEvent) {
        self.shared.events.publish(event);
    }

    pub async fn phase(&self) -> LobbyPhase {
        self.read().await.phase
    }

    pub async fn is_active(&self) -> bool {
        self.phase().await.is_active()
    }

    pub async fn remaining_secs(&self) -> u32 {
        self.read().await.remaining_secs
    }

    pub async fn hiding_secs(&self) -> u32 {
        self.read().await.hiding_secs
    }

    pub async fn host_name(&self) -> Option<String> {
        let state = self.read().await;
        let host = state.host?;
        state
            .participants
            .iter()
            .find(|p| p.id == host)
            .map(|p| p.name.clone())
    }

    /// Participants in join order.
    pub async fn participants(&self) -> Vec<ParticipantInfo> {
        self.read()
            .await
            .participants
            .iter()
            .map(Participant::info)
            .collect()
    }

    pub async fn participant(&self, name: &str) -> Option<ParticipantInfo> {
        self.read().await.find(name).map(Participant::info)
    }

    pub async fn set_hiding_time(&self, seconds: u32) -> Result<(), LobbyError> {
        let mut state = self.write().await;
        if state.phase != LobbyPhase::Idle {
            return Err(LobbyError::WrongPhase {
                action: "change the hiding time",
                phase: state.phase,
            });
        }
        state.hiding_secs = seconds;
        log::info!("hiding time set to {}s", seconds);
        Ok(())
    }

    /// Changes a participant's role while no game is running. Only a
    /// participant that answers `GetMap` with a map can become a hider.
    pub async fn set_role(&self, name: &str, role: Role) -> Result<(), LobbyError> {
        let target = {
            let state = self.read().await;
            if state.phase != LobbyPhase::Idle {
                return Err(LobbyError::WrongPhase {
                    action: "change roles",
                    phase: state.phase,
                });
            }
            state
                .find(name)
                .map(Target::of)
                .ok_or_else(|| LobbyError::UnknownPlayer(name.trim().to_string()))?
        };

        if role == Role::Hider {
            let reply = target
                .dispatch
                .remote(RemoteCommand::GetMap, "")
                .await
                .map_err(|source| LobbyError::Unreachable {
                    name: target.name.clone(),
                    source,
                })?;
            if serde_json::from_str::<Map>(&reply).is_err() {
                return Err(LobbyError::CannotHide(target.name));
            }
        }

        let changed = {
            let mut state = self.write().await;
            if state.phase != LobbyPhase::Idle {
                return Err(LobbyError::WrongPhase {
                    action: "change roles",
                    phase: state.phase,
                });
            }
            let participant = state
                .get_mut(target.id)
                .ok_or_else(|| LobbyError::UnknownPlayer(target.name.clone()))?;
            if participant.role == role {
                None
            } else {
                participant.role = role;
                participant.found = false;
                Some(participant.name.clone())
            }
        };

        if let Some(name) = changed {
            log::info!("{} is now a {}", name, role);
            self.publish(LobbyEvent::RoleChanged { name, role });
        }
        Ok(())
    }

    /// Adds a seeker reached through `dispatch`.
    pub async fn join(
        &self,
        name: &str,
        dispatch: Arc<dyn Dispatch>,
    ) -> Result<Joined, JoinError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(JoinError::EmptyName);
        }

        let joined = {
            let mut state = self.write().await;
            if state.disbanded {
                return Err(JoinError::Disbanded);
            }
            if state.find(name).is_some() {
                return Err(JoinError::NameTaken(name.to_string()));
            }
            let id = state.next_id;
            state.next_id += 1;
            state
                .participants
                .push(Participant::new(id, name.to_string(), Role::Seeker, dispatch));
            Joined {
                id,
                remaining_secs: state.remaining_secs,
            }
        };

        log::info!("{} joined the lobby", name);
        self.publish(LobbyEvent::PlayerJoined {
            id: joined.id,
            name: name.to_string(),
        });
        Ok(joined)
    }

    /// Starts a round: everyone hides for the configured time, then seekers
    /// may guess.
    pub async fn start_game(&self) -> Result<(), LobbyError> {
        let (hiding_secs, round, targets) = {
            let mut state = self.write().await;
            if state.disbanded {
                return Err(LobbyError::Disbanded);
            }
            if state.phase != LobbyPhase::Idle {
                return Err(LobbyError::WrongPhase {
                    action: "start a game",
                    phase: state.phase,
                });
            }
            if state.host.is_none() {
                return Err(LobbyError::NoHost);
            }
            state.phase = LobbyPhase::Hiding;
            state.remaining_secs = state.hiding_secs;
            state.round += 1;
            for participant in &mut state.participants {
                participant.found = false;
            }
            (state.hiding_secs, state.round, state.targets())
        };

        log::info!("game started, {}s to hide", hiding_secs);
        self.publish(LobbyEvent::GameStarted { hiding_secs });

        let unreachable =
            send_to_all(RemoteCommand::StartGame, &hiding_secs.to_string(), targets).await;

        if hiding_secs == 0 {
            self.tick_round(round).await;
        } else {
            self.spawn_ticker(round);
        }

        for id in unreachable {
            self.drop_connection(id).await;
        }
        Ok(())
    }

    fn spawn_ticker(&self, round: u64) {
        let lobby = self.clone();
        let period = self.shared.settings.tick_interval;
        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            let mut disband = lobby.shared.disband.subscribe();
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = disband.wait_for(|disbanded| *disbanded) => break,
                }
                if !lobby.tick_round(round).await {
                    break;
                }
            }
            log::debug!("ticker for round {} stopped", round);
        });
    }

    /// One second of hiding time passes. Returns what is left.
    #[cfg(test)]
    async fn tick(&self) -> u32 {
        let round = self.read().await.round;
        self.tick_round(round).await;
        self.remaining_secs().await
    }

    /// Returns whether the countdown of `round` is still running.
    async fn tick_round(&self, round: u64) -> bool {
        {
            let mut state = self.write().await;
            if state.round != round || state.phase != LobbyPhase::Hiding {
                return false;
            }
            state.remaining_secs = state.remaining_secs.saturating_sub(1);
            if state.remaining_secs > 0 {
                return true;
            }
            state.phase = LobbyPhase::Seeking;
        }

        log::info!("hiding time is over, seekers may guess");
        self.publish(LobbyEvent::SeekingStarted);
        false
    }

    /// `seeker` guesses that `hider` is in `room`.
    ///
    /// Wrong, early, late or repeated guesses are answered with `false`.
    /// An error means the hider could not be asked.
    pub async fn guess_room(
        &self,
        seeker: &str,
        hider: &str,
        room: &str,
    ) -> Result<bool, LobbyError> {
        let guesses = self.shared.guesses.lock().await;

        let (seeker_id, target) = {
            let state = self.read().await;
            if state.phase != LobbyPhase::Seeking {
                log::debug!("{} guessed while the lobby is {}", seeker.trim(), state.phase);
                return Ok(false);
            }
            let Some(seeker) = state.find(seeker).filter(|p| p.role == Role::Seeker) else {
                return Ok(false);
            };
            let Some(hider) = state.find(hider).filter(|p| p.is_hidden()) else {
                return Ok(false);
            };
            (seeker.id, Target::of(hider))
        };

        let reply = match target.dispatch.remote(RemoteCommand::GuessRoom, room).await {
            Ok(reply) => reply,
            Err(source) => {
                drop(guesses);
                self.drop_connection(target.id).await;
                return Err(LobbyError::Unreachable {
                    name: target.name,
                    source,
                });
            }
        };
        if decode_bool(&reply) != Some(true) {
            return Ok(false);
        }

        let points = self.shared.settings.points_per_find;
        let (award, all_found) = {
            let mut state = self.write().await;
            if state.phase != LobbyPhase::Seeking {
                return Ok(false);
            }
            match state.get_mut(target.id) {
                Some(hider) if !hider.found => hider.found = true,
                _ => return Ok(false),
            }
            let award = state.get_mut(seeker_id).map(|seeker| {
                seeker.score += points;
                Target::of(seeker)
            });
            (award, state.hidden_count() == 0)
        };
        drop(guesses);

        let seeker_name = award
            .as_ref()
            .map(|t| t.name.clone())
            .unwrap_or_else(|| seeker.trim().to_string());
        log::info!("{} found {} in {}", seeker_name, target.name, room.trim());
        self.publish(LobbyEvent::HiderFound {
            hider: target.name.clone(),
            seeker: seeker_name,
        });

        if let Some(award) = award {
            let awarded = award
                .dispatch
                .remote(RemoteCommand::AddPoints, &points.to_string())
                .await;
            if let Err(e) = awarded {
                log::warn!("could not award points to {}: {}", award.name, e);
                self.drop_connection(award.id).await;
            }
        }

        if all_found {
            log::info!("every hider has been found");
            let _ = self.end_game().await;
        }
        Ok(true)
    }

    pub async fn end_game(&self) -> Result<(), LobbyError> {
        let targets = {
            let mut state = self.write().await;
            if !state.phase.is_active() {
                return Err(LobbyError::WrongPhase {
                    action: "end the game",
                    phase: state.phase,
                });
            }
            state.phase = LobbyPhase::Ended;
            state.targets()
        };

        log::info!("game over");
        self.publish(LobbyEvent::GameEnded);

        for id in send_to_all(RemoteCommand::EndGame, "", targets).await {
            self.remove(id).await;
        }
        Ok(())
    }

    /// Back to `Idle` after a game, keeping everyone and their scores.
    pub async fn reset(&self) -> Result<(), LobbyError> {
        let mut state = self.write().await;
        if state.phase != LobbyPhase::Ended || state.disbanded {
            return Err(LobbyError::WrongPhase {
                action: "reset",
                phase: state.phase,
            });
        }
        state.phase = LobbyPhase::Idle;
        state.remaining_secs = 0;
        for participant in &mut state.participants {
            participant.found = false;
        }
        log::info!("lobby is ready for another round");
        Ok(())
    }

    /// Removes the named participant. Removing the host disbands the lobby.
    pub async fn disconnect(&self, name: &str) -> bool {
        let id = self.read().await.find(name).map(|p| p.id);
        match id {
            Some(id) => self.drop_connection(id).await,
            None => false,
        }
    }

    /// Like [`Lobby::disconnect`], keyed by the id handed out at join.
    pub async fn drop_connection(&self, id: PlayerId) -> bool {
        if self.read().await.host == Some(id) {
            self.disband().await;
            return true;
        }

        let Some((removed, game_over)) = self.remove(id).await else {
            return false;
        };

        if game_over {
            log::info!("{} leaving ends the game", removed.name);
            let _ = self.end_game().await;
        }
        true
    }

    /// Takes a participant out and closes its route. Returns it with whether
    /// the running game can no longer continue without it.
    async fn remove(&self, id: PlayerId) -> Option<(Participant, bool)> {
        let (removed, game_over) = {
            let mut state = self.write().await;
            let index = state.participants.iter().position(|p| p.id == id)?;
            let removed = state.participants.remove(index);
            let game_over = state.phase.is_active()
                && (state.hidden_count() == 0 || state.seeker_count() == 0);
            (removed, game_over)
        };

        log::info!("{} left the lobby", removed.name);
        self.publish(LobbyEvent::PlayerLeft {
            id: removed.id,
            name: removed.name.clone(),
        });
        removed.dispatch.close().await;
        Some((removed, game_over))
    }

    /// Maps of every hider not found yet, keyed by hider. Hiders that cannot
    /// be reached are left out.
    pub async fn view_maps(&self) -> HashMap<String, Map> {
        let hidden: Vec<Target> = {
            let state = self.read().await;
            state
                .participants
                .iter()
                .filter(|p| p.is_hidden())
                .map(Target::of)
                .collect()
        };

        let mut maps = HashMap::with_capacity(hidden.len());
        for target in hidden {
            match target.dispatch.remote(RemoteCommand::GetMap, "").await {
                Ok(reply) => match serde_json::from_str::<Map>(&reply) {
                    Ok(map) => {
                        maps.insert(target.name, map);
                    }
                    Err(e) => log::debug!("{} sent no usable map: {}", target.name, e),
                },
                Err(e) => log::warn!("could not fetch the map of {}: {}", target.name, e),
            }
        }
        maps
    }

    /// The room `hider` is in, or an unnamed room if there is no such hider.
    pub async fn hider_location(&self, hider: &str) -> Result<Room, LobbyError> {
        let target = {
            let state = self.read().await;
            match state.find(hider).filter(|p| p.role == Role::Hider) {
                Some(participant) => Target::of(participant),
                None => return Ok(Room::default()),
            }
        };

        let reply = target
            .dispatch
            .remote(RemoteCommand::GetPosition, "")
            .await
            .map_err(|source| LobbyError::Unreachable {
                name: target.name.clone(),
                source,
            })?;
        Ok(serde_json::from_str(&reply).unwrap_or_default())
    }

    /// Tears the session down: ends a running game, closes every route and
    /// wakes everything waiting on [`Lobby::disbanded`].
    pub async fn disband(&self) {
        let (was_active, participants) = {
            let mut state = self.write().await;
            if state.disbanded {
                return;
            }
            state.disbanded = true;
            let was_active = state.phase.is_active();
            state.phase = LobbyPhase::Ended;
            state.host = None;
            (was_active, std::mem::take(&mut state.participants))
        };

        if was_active {
            self.publish(LobbyEvent::GameEnded);
            let targets = participants.iter().map(Target::of).collect();
            send_to_all(RemoteCommand::EndGame, "", targets).await;
        }
        for participant in &participants {
            participant.dispatch.close().await;
        }

        self.shared.disband.send_replace(true);
        log::info!("lobby disbanded");
        self.publish(LobbyEvent::Disbanded);
    }

    pub fn is_disbanded(&self) -> bool {
        *self.shared.disband.borrow()
    }

    /// Resolves once the lobby has been disbanded.
    pub async fn disbanded(&self) {
        let mut rx = self.shared.disband.subscribe();
        let _ = rx.wait_for(|disbanded| *disbanded).await;
    }
}

/// Sends `command` to every target at once. Returns the ids that could not
/// be reached.
async fn send_to_all(
    command: RemoteCommand,
    argument: &str,
    targets: Vec<Target>,
) -> Vec<PlayerId> {
    let mut calls = JoinSet::new();
    for target in targets {
        let argument = argument.to_string();
        calls.spawn(async move {
            let result = target.dispatch.remote(command, &argument).await;
            (target.id, target.name, result)
        });
    }

    let mut unreachable = Vec::new();
    while let Some(joined) = calls.join_next().await {
        match joined {
            Ok((_, _, Ok(_))) => {}
            Ok((id, name, Err(e))) => {
                log::warn!("{} did not receive {}: {}", name, command, e);
                unreachable.push(id);
            }
            Err(e) => log::error!("{} broadcast task failed: {}", command, e),
        }
    }
    unreachable
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::net::LocalDispatch;
    use crate::player::PlayerAgent;
    use crate::position::PathTracker;

    struct Unreachable;

    #[async_trait]
    impl Dispatch for Unreachable {
        async fn remote(&self, _: RemoteCommand, _: &str) -> Result<String, ChannelError> {
            Err(ChannelError::Closed)
        }

        fn is_local(&self) -> bool {
            false
        }
    }

    fn settings(hiding_secs: u32) -> LobbySettings {
        LobbySettings {
            hiding_secs,
            tick_interval: Duration::from_secs(3600),
            ..Default::default()
        }
    }

    fn local(agent: &Arc<PlayerAgent>) -> Arc<dyn Dispatch> {
        Arc::new(LocalDispatch::new(Arc::clone(agent)))
    }

    struct Game {
        lobby: Lobby,
        tracker: Arc<PathTracker>,
        hider: Arc<PlayerAgent>,
        seeker: Arc<PlayerAgent>,
    }

    /// Hider "A" hosts, seeker "B" joins.
    async fn game(hiding_secs: u32) -> Game {
        let tracker = Arc::new(PathTracker::with_devices([
            ("pir-kitchen", "kitchen"),
            ("pir-hall", "hall"),
        ]));
        let mut map = Map::new();
        map.add_room(Room::new("kitchen")).unwrap();
        map.add_room(Room::new("hall")).unwrap();

        let hider = PlayerAgent::hider("A", tracker.clone(), map);
        let seeker = PlayerAgent::seeker("B");
        let lobby = Lobby::new(settings(hiding_secs), "A", Role::Hider, local(&hider)).unwrap();
        lobby.join("B", local(&seeker)).await.unwrap();

        Game {
            lobby,
            tracker,
            hider,
            seeker,
        }
    }

    #[tokio::test]
    async fn test_duplicate_join_is_rejected() {
        let agent = PlayerAgent::seeker("A");
        let lobby = Lobby::new(settings(10), "A", Role::Seeker, local(&agent)).unwrap();

        let again = PlayerAgent::seeker("A");
        assert_eq!(
            lobby.join("A", local(&again)).await,
            Err(JoinError::NameTaken("A".to_string()))
        );
        assert_eq!(lobby.join("  ", local(&again)).await, Err(JoinError::EmptyName));
        assert_eq!(lobby.participants().await.len(), 1);
    }

    #[tokio::test]
    async fn test_join_reports_remaining_time() {
        let game = game(30).await;
        let mut events = game.lobby.subscribe();
        game.lobby.start_game().await.unwrap();

        let late = PlayerAgent::seeker("C");
        let joined = game.lobby.join("C", local(&late)).await.unwrap();
        assert_eq!(joined.remaining_secs, 30);
        assert_eq!(joined.id, 3);

        assert_eq!(
            events.recv().await.unwrap(),
            LobbyEvent::GameStarted { hiding_secs: 30 }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            LobbyEvent::PlayerJoined {
                id: 3,
                name: "C".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_countdown_stops_at_zero() {
        let game = game(10).await;
        game.lobby.start_game().await.unwrap();
        assert_eq!(game.lobby.phase().await, LobbyPhase::Hiding);
        assert!(game.hider.is_active());

        for expected in (0..10).rev() {
            assert_eq!(game.lobby.tick().await, expected);
        }
        assert_eq!(game.lobby.phase().await, LobbyPhase::Seeking);
        assert!(game.lobby.is_active().await);

        assert_eq!(game.lobby.tick().await, 0);
        assert_eq!(game.lobby.phase().await, LobbyPhase::Seeking);
    }

    #[tokio::test]
    async fn test_ticker_drives_countdown() {
        let tracker = Arc::new(PathTracker::default());
        let hider = PlayerAgent::hider("A", tracker, Map::new());
        let settings = LobbySettings {
            hiding_secs: 2,
            tick_interval: Duration::from_millis(10),
            ..Default::default()
        };
        let lobby = Lobby::new(settings, "A", Role::Hider, local(&hider)).unwrap();
        let mut events = lobby.subscribe();

        lobby.start_game().await.unwrap();
        loop {
            if events.recv().await.unwrap() == LobbyEvent::SeekingStarted {
                break;
            }
        }
        assert_eq!(lobby.remaining_secs().await, 0);
        assert_eq!(lobby.phase().await, LobbyPhase::Seeking);
    }

    #[tokio::test]
    async fn test_guess_finds_hider_and_ends_game() {
        let game = game(10).await;
        game.lobby.start_game().await.unwrap();
        for _ in 0..10 {
            game.lobby.tick().await;
        }
        game.tracker.activate("pir-kitchen").await.unwrap();

        assert!(!game.lobby.guess_room("B", "A", "hall").await.unwrap());
        assert!(game.lobby.guess_room("B", "A", "kitchen").await.unwrap());

        assert_eq!(game.lobby.participant("B").await.unwrap().score, 10);
        assert_eq!(game.seeker.score(), 10);
        assert!(game.lobby.participant("A").await.unwrap().found);
        assert_eq!(game.lobby.phase().await, LobbyPhase::Ended);
        assert!(!game.hider.is_active());
    }

    #[tokio::test]
    async fn test_second_guess_is_refused() {
        let game = game(0).await;
        let other = PlayerAgent::hider("D", Arc::new(PathTracker::default()), Map::new());
        game.lobby.join("D", local(&other)).await.unwrap();
        game.lobby.set_role("D", Role::Hider).await.unwrap();

        game.lobby.start_game().await.unwrap();
        assert_eq!(game.lobby.phase().await, LobbyPhase::Seeking);
        game.tracker.activate("pir-kitchen").await.unwrap();

        assert!(game.lobby.guess_room("B", "A", "kitchen").await.unwrap());
        assert!(!game.lobby.guess_room("B", "A", "kitchen").await.unwrap());
        assert_eq!(game.seeker.score(), 10);
        assert_eq!(game.lobby.phase().await, LobbyPhase::Seeking);
    }

    #[tokio::test]
    async fn test_guess_during_hiding_is_refused() {
        let game = game(10).await;
        game.lobby.start_game().await.unwrap();
        game.tracker.activate("pir-kitchen").await.unwrap();

        assert!(!game.lobby.guess_room("B", "A", "kitchen").await.unwrap());
        assert!(!game.lobby.guess_room("B", "nobody", "kitchen").await.unwrap());
        assert!(!game.lobby.guess_room("A", "A", "kitchen").await.unwrap());
        assert_eq!(game.seeker.score(), 0);
    }

    #[tokio::test]
    async fn test_wrong_phase() {
        let game = game(10).await;
        assert!(matches!(
            game.lobby.end_game().await,
            Err(LobbyError::WrongPhase { .. })
        ));
        game.lobby.start_game().await.unwrap();
        assert!(matches!(
            game.lobby.start_game().await,
            Err(LobbyError::WrongPhase {
                phase: LobbyPhase::Hiding,
                ..
            })
        ));
        assert!(game.lobby.set_hiding_time(5).await.is_err());
        assert!(game.lobby.set_role("B", Role::Hider).await.is_err());
        assert!(game.lobby.reset().await.is_err());
    }

    #[tokio::test]
    async fn test_reset_keeps_scores() {
        let game = game(0).await;
        game.lobby.start_game().await.unwrap();
        game.tracker.activate("pir-hall").await.unwrap();
        assert!(game.lobby.guess_room("B", "A", "hall").await.unwrap());
        assert_eq!(game.lobby.phase().await, LobbyPhase::Ended);

        game.lobby.reset().await.unwrap();
        game.lobby.set_hiding_time(60).await.unwrap();
        assert_eq!(game.lobby.phase().await, LobbyPhase::Idle);
        assert!(!game.lobby.participant("A").await.unwrap().found);
        assert_eq!(game.lobby.participant("B").await.unwrap().score, 10);
        assert_eq!(game.lobby.hiding_secs().await, 60);
    }

    #[tokio::test]
    async fn test_last_seeker_leaving_ends_game() {
        let game = game(10).await;
        game.lobby.start_game().await.unwrap();

        assert!(game.lobby.disconnect("B").await);
        assert!(!game.lobby.disconnect("B").await);
        assert_eq!(game.lobby.phase().await, LobbyPhase::Ended);
        assert_eq!(game.lobby.participants().await.len(), 1);
    }

    #[tokio::test]
    async fn test_host_leaving_disbands() {
        let game = game(10).await;
        let mut events = game.lobby.subscribe();
        game.lobby.start_game().await.unwrap();

        assert!(game.lobby.disconnect("A").await);
        game.lobby.disbanded().await;
        assert!(game.lobby.is_disbanded());
        assert!(game.lobby.participants().await.is_empty());
        assert_eq!(game.lobby.host_name().await, None);
        assert!(!game.seeker.is_active());

        let late = PlayerAgent::seeker("C");
        assert_eq!(
            game.lobby.join("C", local(&late)).await,
            Err(JoinError::Disbanded)
        );

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(seen.last(), Some(&LobbyEvent::Disbanded));
    }

    #[tokio::test]
    async fn test_unreachable_participant_is_dropped() {
        let game = game(10).await;
        game.lobby.join("C", Arc::new(Unreachable)).await.unwrap();

        game.lobby.start_game().await.unwrap();
        assert!(game.lobby.participant("C").await.is_none());
        assert_eq!(game.lobby.phase().await, LobbyPhase::Hiding);
        assert!(game.seeker.is_active());
    }

    #[tokio::test]
    async fn test_view_maps_skips_found_hiders() {
        let game = game(0).await;
        let other = PlayerAgent::hider("D", Arc::new(PathTracker::default()), Map::new());
        game.lobby.join("D", local(&other)).await.unwrap();
        game.lobby.set_role("D", Role::Hider).await.unwrap();

        let maps = game.lobby.view_maps().await;
        assert_eq!(maps.len(), 2);
        assert_eq!(
            maps["A"].room_names().collect::<Vec<_>>(),
            vec!["hall", "kitchen"]
        );

        game.lobby.start_game().await.unwrap();
        game.tracker.activate("pir-kitchen").await.unwrap();
        assert!(game.lobby.guess_room("B", "A", "kitchen").await.unwrap());

        let maps = game.lobby.view_maps().await;
        assert_eq!(maps.keys().collect::<Vec<_>>(), vec!["D"]);
    }

    #[tokio::test]
    async fn test_only_participants_with_a_map_can_hide() {
        let host = PlayerAgent::seeker("A");
        let lobby = Lobby::new(settings(0), "A", Role::Seeker, local(&host)).unwrap();
        let seeker = PlayerAgent::seeker("B");
        lobby.join("B", local(&seeker)).await.unwrap();
        let hider = PlayerAgent::hider("C", Arc::new(PathTracker::default()), Map::new());
        lobby.join("C", local(&hider)).await.unwrap();
        let mut events = lobby.subscribe();

        assert!(matches!(
            lobby.set_role("B", Role::Hider).await,
            Err(LobbyError::CannotHide(name)) if name == "B"
        ));
        assert!(matches!(
            lobby.set_role("A", Role::Hider).await,
            Err(LobbyError::CannotHide(_))
        ));
        assert_eq!(lobby.participant("B").await.unwrap().role, Role::Seeker);

        lobby.set_role("C", Role::Hider).await.unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            LobbyEvent::RoleChanged {
                name: "C".to_string(),
                role: Role::Hider
            }
        );
        assert!(events.try_recv().is_err());

        lobby.set_role("C", Role::Seeker).await.unwrap();
        assert_eq!(lobby.participant("C").await.unwrap().role, Role::Seeker);
    }

    #[tokio::test]
    async fn test_concurrent_guesses_find_once() {
        let game = game(0).await;
        let rival = PlayerAgent::seeker("C");
        game.lobby.join("C", local(&rival)).await.unwrap();
        game.lobby.start_game().await.unwrap();
        game.tracker.activate("pir-kitchen").await.unwrap();

        let (first, second) = tokio::join!(
            game.lobby.guess_room("B", "A", "kitchen"),
            game.lobby.guess_room("C", "A", "kitchen"),
        );
        let hits = [first.unwrap(), second.unwrap()];
        assert_eq!(hits.iter().filter(|hit| **hit).count(), 1);
        assert_eq!(game.seeker.score() + rival.score(), 10);
        assert_eq!(game.lobby.phase().await, LobbyPhase::Ended);
    }

    #[tokio::test]
    async fn test_concurrent_joins_with_one_name() {
        let game = game(10).await;
        let first = PlayerAgent::seeker("C");
        let second = PlayerAgent::seeker("C");

        let (a, b) = tokio::join!(
            game.lobby.join("C", local(&first)),
            game.lobby.join("C", local(&second)),
        );
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| *r == Err(JoinError::NameTaken("C".to_string())))
        );
        assert_eq!(game.lobby.participants().await.len(), 3);
    }

    #[tokio::test]
    async fn test_hider_location() {
        let game = game(10).await;
        game.lobby.start_game().await.unwrap();
        game.tracker.activate("pir-hall").await.unwrap();

        assert_eq!(game.lobby.hider_location("A").await.unwrap().name, "hall");
        assert_eq!(game.lobby.hider_location("B").await.unwrap(), Room::default());
        assert_eq!(
            game.lobby.hider_location("nobody").await.unwrap(),
            Room::default()
        );
    }
}
