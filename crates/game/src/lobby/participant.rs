use std::fmt;
use std::sync::Arc;

use super::PlayerId;
use crate::net::Dispatch;
use crate::player::Role;

/// The lobby's record of one participant.
pub(crate) struct Participant {
    pub id: PlayerId,
    pub name: String,
    pub role: Role,
    pub score: u32,
    pub found: bool,
    pub is_host: bool,
    pub dispatch: Arc<dyn Dispatch>,
}

impl Participant {
    pub fn new(id: PlayerId, name: String, role: Role, dispatch: Arc<dyn Dispatch>) -> Self {
        Self {
            id,
            name,
            role,
            score: 0,
            found: false,
            is_host: false,
            dispatch,
        }
    }

    /// A hider that seekers may still guess.
    pub fn is_hidden(&self) -> bool {
        self.role == Role::Hider && !self.found
    }

    pub fn info(&self) -> ParticipantInfo {
        ParticipantInfo {
            id: self.id,
            name: self.name.clone(),
            role: self.role,
            score: self.score,
            found: self.found,
            is_host: self.is_host,
            local: self.dispatch.is_local(),
        }
    }
}

impl fmt::Debug for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Participant")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("score", &self.score)
            .field("found", &self.found)
            .field("is_host", &self.is_host)
            .field("local", &self.dispatch.is_local())
            .finish()
    }
}

/// Read-only snapshot of a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantInfo {
    pub id: PlayerId,
    pub name: String,
    pub role: Role,
    pub score: u32,
    pub found: bool,
    pub is_host: bool,
    pub local: bool,
}
