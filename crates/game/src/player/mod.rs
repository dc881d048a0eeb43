mod agent;
mod role;

use std::fmt;

pub use agent::PlayerAgent;
pub use role::{Hider, RoleCapability, Seeker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Hider,
    Seeker,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Hider => "hider",
            Role::Seeker => "seeker",
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "hider" => Some(Role::Hider),
            "seeker" => Some(Role::Seeker),
            _ => None,
        }
    }

    pub fn swapped(&self) -> Self {
        match self {
            Role::Hider => Role::Seeker,
            Role::Seeker => Role::Hider,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
