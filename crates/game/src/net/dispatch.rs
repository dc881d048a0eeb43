use std::sync::Arc;

use async_trait::async_trait;

use super::channel::{ChannelError, CommandChannel};
use super::protocol::{HostCommand, RemoteCommand};
use crate::player::PlayerAgent;

/// Route from the lobby to one participant.
///
/// The lobby talks to every participant through this, so it never needs to
/// know whether the agent lives in this process or behind a connection.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn remote(&self, command: RemoteCommand, argument: &str)
    -> Result<String, ChannelError>;

    fn is_local(&self) -> bool;

    /// Releases whatever carries the commands. Nothing to do in-process.
    async fn close(&self) {}
}

/// Route from a participant to the host, for host-only actions.
#[async_trait]
pub trait HostDispatch: Send + Sync {
    async fn host(
        &self,
        target: &str,
        command: HostCommand,
        argument: &str,
    ) -> Result<String, ChannelError>;
}

/// Runs commands against an agent living in this process.
pub struct LocalDispatch {
    agent: Arc<PlayerAgent>,
}

impl LocalDispatch {
    pub fn new(agent: Arc<PlayerAgent>) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &Arc<PlayerAgent> {
        &self.agent
    }
}

#[async_trait]
impl Dispatch for LocalDispatch {
    async fn remote(
        &self,
        command: RemoteCommand,
        argument: &str,
    ) -> Result<String, ChannelError> {
        Ok(self.agent.handle(command, argument).await)
    }

    fn is_local(&self) -> bool {
        true
    }
}

/// Sends commands over a participant's connection.
pub struct ChannelDispatch {
    channel: CommandChannel,
}

impl ChannelDispatch {
    pub fn new(channel: CommandChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Dispatch for ChannelDispatch {
    async fn remote(
        &self,
        command: RemoteCommand,
        argument: &str,
    ) -> Result<String, ChannelError> {
        self.channel.call(&[command.as_str(), argument]).await
    }

    fn is_local(&self) -> bool {
        false
    }

    async fn close(&self) {
        self.channel.close().await;
    }
}

#[async_trait]
impl HostDispatch for CommandChannel {
    async fn host(
        &self,
        target: &str,
        command: HostCommand,
        argument: &str,
    ) -> Result<String, ChannelError> {
        self.call(&[target, command.as_str(), argument]).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};

    use super::*;

    #[tokio::test]
    async fn test_local_dispatch_runs_in_process() {
        let agent = PlayerAgent::seeker("B");
        let dispatch = LocalDispatch::new(agent.clone());

        assert!(dispatch.is_local());
        let total = dispatch.remote(RemoteCommand::AddPoints, "10").await.unwrap();
        assert_eq!(total, "10");
        assert_eq!(agent.score(), 10);
    }

    #[tokio::test]
    async fn test_channel_dispatch_writes_two_lines() {
        let (ours, theirs) = duplex(1024);
        let (read, write) = tokio::io::split(ours);
        let (channel, _requests) = CommandChannel::spawn(BufReader::new(read), write, 3, "test");
        let dispatch = ChannelDispatch::new(channel);
        assert!(!dispatch.is_local());

        let (peer_read, mut peer_write) = tokio::io::split(theirs);
        let mut peer_read = BufReader::new(peer_read);

        let call = tokio::spawn(async move {
            dispatch.remote(RemoteCommand::StartGame, "300").await
        });

        let mut lines = Vec::new();
        for _ in 0..2 {
            let mut line = String::new();
            peer_read.read_line(&mut line).await.unwrap();
            lines.push(line);
        }
        assert_eq!(lines, vec!["?StartGame\n", "?300\n"]);

        peer_write.write_all(b"=\n").await.unwrap();
        assert_eq!(call.await.unwrap().unwrap(), "");
    }
}
