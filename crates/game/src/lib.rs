pub mod event;
pub mod lobby;
pub mod map;
pub mod net;
pub mod player;
pub mod position;

pub use event::{EventBus, LobbyEvent, PlayerEvent};
pub use lobby::{
    JoinError, Joined, Lobby, LobbyError, LobbyPhase, LobbySettings, ParticipantInfo, PlayerId,
};
pub use map::{Map, MapError, Room};
pub use net::{
    ChannelDispatch, ChannelError, CommandChannel, DEFAULT_PORT, Dispatch, Guest, GuestError, Host,
    HostCommand, HostDispatch, HostHandle, LocalDispatch, RemoteCommand,
};
pub use player::{Hider, PlayerAgent, Role, RoleCapability, Seeker};
pub use position::{PathTracker, PositionProvider, ProviderError};
