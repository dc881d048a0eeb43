use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 25555;

/// Handshake answer for an identifier that is already taken.
pub const JOIN_REJECTED: i64 = -1;

pub const REQUEST_MARKER: char = '?';
pub const RESPONSE_MARKER: char = '=';

/// Request lines for a host command: target, command, argument.
pub const HOST_REQUEST_LINES: usize = 3;
/// Request lines for a remote command: command, argument.
pub const REMOTE_REQUEST_LINES: usize = 2;

/// Actions the host asks a single participant to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCommand {
    StartGame,
    EndGame,
    GuessRoom,
    AddPoints,
    GetMap,
    GetPosition,
}

impl RemoteCommand {
    pub const ALL: [RemoteCommand; 6] = [
        RemoteCommand::StartGame,
        RemoteCommand::EndGame,
        RemoteCommand::GuessRoom,
        RemoteCommand::AddPoints,
        RemoteCommand::GetMap,
        RemoteCommand::GetPosition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteCommand::StartGame => "StartGame",
            RemoteCommand::EndGame => "EndGame",
            RemoteCommand::GuessRoom => "GuessRoom",
            RemoteCommand::AddPoints => "AddPoints",
            RemoteCommand::GetMap => "GetMap",
            RemoteCommand::GetPosition => "GetPosition",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name.trim())
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions a participant asks the host to perform on its behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCommand {
    EndGame,
    Disconnect,
    GetRemainingTime,
    GuessRoom,
    ViewMaps,
    GetHiderPosition,
}

impl HostCommand {
    pub const ALL: [HostCommand; 6] = [
        HostCommand::EndGame,
        HostCommand::Disconnect,
        HostCommand::GetRemainingTime,
        HostCommand::GuessRoom,
        HostCommand::ViewMaps,
        HostCommand::GetHiderPosition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HostCommand::EndGame => "EndGame",
            HostCommand::Disconnect => "Disconnect",
            HostCommand::GetRemainingTime => "GetRemainingTime",
            HostCommand::GuessRoom => "GuessRoom",
            HostCommand::ViewMaps => "ViewMaps",
            HostCommand::GetHiderPosition => "GetHiderPosition",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name.trim())
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the post-handshake exchange.
///
/// Both peers may have a request outstanding at the same time on one
/// connection, so each line says whether it asks or answers. The marker is
/// an extension of the plain-line protocol: a peer that sends unmarked lines
/// gets no answer, and an empty result travels as a bare `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Request(String),
    Response(String),
}

impl Line {
    pub fn encode(&self) -> String {
        let (marker, text) = match self {
            Line::Request(text) => (REQUEST_MARKER, text),
            Line::Response(text) => (RESPONSE_MARKER, text),
        };
        let mut out = String::with_capacity(text.len() + 2);
        out.push(marker);
        out.push_str(&single_line(text));
        out.push('\n');
        out
    }

    /// Returns `None` for a line without a known marker.
    pub fn decode(raw: &str) -> Option<Self> {
        let raw = raw.trim_end_matches(['\r', '\n']);
        let mut chars = raw.chars();
        match chars.next()? {
            REQUEST_MARKER => Some(Line::Request(chars.as_str().to_string())),
            RESPONSE_MARKER => Some(Line::Response(chars.as_str().to_string())),
            _ => None,
        }
    }
}

/// Folds embedded line breaks so a value always occupies one line.
pub fn single_line(text: &str) -> Cow<'_, str> {
    if text.contains(['\n', '\r']) {
        Cow::Owned(text.replace(['\n', '\r'], " "))
    } else {
        Cow::Borrowed(text)
    }
}

/// The host's one-line answer to a join attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinReply {
    Accepted { remaining_secs: u32 },
    Rejected,
}

impl JoinReply {
    pub fn encode(&self) -> String {
        match self {
            JoinReply::Accepted { remaining_secs } => format!("{}\n", remaining_secs),
            JoinReply::Rejected => format!("{}\n", JOIN_REJECTED),
        }
    }

    pub fn parse(line: &str) -> Option<Self> {
        let value: i64 = line.trim().parse().ok()?;
        if value == JOIN_REJECTED {
            return Some(JoinReply::Rejected);
        }
        u32::try_from(value)
            .ok()
            .map(|remaining_secs| JoinReply::Accepted { remaining_secs })
    }
}

pub fn encode_bool(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

pub fn decode_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "true" | "True" => Some(true),
        "false" | "False" => Some(false),
        _ => None,
    }
}

/// Argument of the `GuessRoom` host command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessArgs {
    pub hider: String,
    pub room: String,
}

impl GuessArgs {
    pub fn new(hider: impl Into<String>, room: impl Into<String>) -> Self {
        Self {
            hider: hider.into(),
            room: room.into(),
        }
    }

    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn decode(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}
