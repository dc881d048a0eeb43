mod bus;
mod types;

pub use bus::{DEFAULT_EVENT_CAPACITY, EventBus};
pub use types::{LobbyEvent, PlayerEvent};
