use hidenseek::PlayerEvent;
use tokio::sync::broadcast::{self, error::RecvError};

pub fn describe(event: &PlayerEvent) -> String {
    match event {
        PlayerEvent::GameStarted { hiding_secs } => {
            format!("game started, {}s until the seekers come", hiding_secs)
        }
        PlayerEvent::GameEnded => String::from("game over"),
        PlayerEvent::Found => String::from("you have been found"),
        PlayerEvent::PointsAwarded { points, total } => {
            format!("+{} points, {} in total", points, total)
        }
        PlayerEvent::ConnectionLost => String::from("connection lost"),
    }
}

pub async fn print_events(mut events: broadcast::Receiver<PlayerEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => println!("* {}", describe(&event)),
            Err(RecvError::Lagged(missed)) => log::warn!("missed {} events", missed),
            Err(RecvError::Closed) => break,
        }
    }
}
