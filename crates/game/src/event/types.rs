use crate::lobby::PlayerId;
use crate::player::Role;

/// Session-wide notifications published by the host's lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyEvent {
    PlayerJoined { id: PlayerId, name: String },
    PlayerLeft { id: PlayerId, name: String },
    RoleChanged { name: String, role: Role },
    GameStarted { hiding_secs: u32 },
    SeekingStarted,
    HiderFound { hider: String, seeker: String },
    GameEnded,
    Disbanded,
}

impl LobbyEvent {
    /// Events that change who is in the lobby rather than the game itself.
    pub fn is_membership(&self) -> bool {
        matches!(
            self,
            Self::PlayerJoined { .. } | Self::PlayerLeft { .. } | Self::RoleChanged { .. }
        )
    }
}

/// Notifications a single participant raises about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    GameStarted { hiding_secs: u32 },
    GameEnded,
    Found,
    PointsAwarded { points: u32, total: u32 },
    ConnectionLost,
}
