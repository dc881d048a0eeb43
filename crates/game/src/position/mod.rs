mod tracker;

use async_trait::async_trait;

pub use tracker::{PATH_SEPARATOR, PathTracker};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("position source unavailable: {0}")]
    Unavailable(String),
    #[error("unknown device: {0}")]
    UnknownDevice(String),
}

/// Reports where a hider physically is.
///
/// Implementations sit in front of whatever tracks the hider (sensors, home
/// automation, a scripted trail) and are only ever consulted by the hider's
/// own agent.
#[async_trait]
pub trait PositionProvider: Send + Sync {
    /// Names of every room the tracking system knows about.
    async fn list_rooms(&self) -> Result<Vec<String>, ProviderError>;

    /// Called when the hiding phase starts.
    async fn begin_tracking(&self) -> Result<(), ProviderError>;

    /// The raw trail the hider has left so far.
    async fn current_path(&self) -> Result<String, ProviderError>;

    /// The room the hider is in, or an empty string if undetermined.
    async fn current_room(&self) -> Result<String, ProviderError>;
}
