use hidenseek::LobbyEvent;
use tokio::sync::broadcast::{self, error::RecvError};

pub fn describe(event: &LobbyEvent) -> String {
    match event {
        LobbyEvent::PlayerJoined { id, name } => format!("{} joined (#{})", name, id),
        LobbyEvent::PlayerLeft { name, .. } => format!("{} left", name),
        LobbyEvent::RoleChanged { name, role } => format!("{} is now a {}", name, role),
        LobbyEvent::GameStarted { hiding_secs } => {
            format!("game started, hiders have {}s to hide", hiding_secs)
        }
        LobbyEvent::SeekingStarted => String::from("time is up, start seeking"),
        LobbyEvent::HiderFound { hider, seeker } => format!("{} found {}", seeker, hider),
        LobbyEvent::GameEnded => String::from("game over"),
        LobbyEvent::Disbanded => String::from("lobby disbanded"),
    }
}

/// Echoes lobby events to the console until the lobby goes away.
pub async fn print_events(mut events: broadcast::Receiver<LobbyEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                println!("* {}", describe(&event));
                if event == LobbyEvent::Disbanded {
                    break;
                }
            }
            Err(RecvError::Lagged(missed)) => log::warn!("missed {} lobby events", missed),
            Err(RecvError::Closed) => break,
        }
    }
}
