use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::task::JoinHandle;

use super::channel::{ChannelError, CommandChannel, Requests};
use super::dispatch::HostDispatch;
use super::protocol::{
    HostCommand, JoinReply, REMOTE_REQUEST_LINES, RemoteCommand, decode_bool, single_line,
};
use crate::map::{Map, Room};
use crate::player::PlayerAgent;

#[derive(Debug, thiserror::Error)]
pub enum GuestError {
    #[error("identifier already in use")]
    NameTaken,
    #[error("unexpected reply from host: {0:?}")]
    UnexpectedReply(String),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("connection error: {0}")]
    Io(#[from] io::Error),
}

/// A participant connected to a remote host.
///
/// The host's remote commands are answered by the agent in the background;
/// the methods here issue host commands as that agent.
pub struct Guest {
    agent: Arc<PlayerAgent>,
    channel: CommandChannel,
    remaining_at_join: u32,
    commands: JoinHandle<()>,
    leaving: Arc<AtomicBool>,
}

impl Guest {
    pub async fn connect(
        addr: impl ToSocketAddrs,
        agent: Arc<PlayerAgent>,
    ) -> Result<Self, GuestError> {
        let stream = TcpStream::connect(addr).await?;
        let _ = stream.set_nodelay(true);
        let peer = stream.peer_addr()?;
        let (read_half, mut write_half) = stream.into_split();

        let mut hello = single_line(agent.name()).into_owned();
        hello.push('\n');
        write_half.write_all(hello.as_bytes()).await?;

        let mut reader = BufReader::new(read_half);
        let mut reply = String::new();
        if reader.read_line(&mut reply).await? == 0 {
            return Err(ChannelError::Closed.into());
        }
        let remaining_at_join = match JoinReply::parse(&reply) {
            Some(JoinReply::Accepted { remaining_secs }) => remaining_secs,
            Some(JoinReply::Rejected) => return Err(GuestError::NameTaken),
            None => return Err(GuestError::UnexpectedReply(reply.trim().to_string())),
        };

        let (channel, requests) = CommandChannel::spawn(
            reader,
            write_half,
            REMOTE_REQUEST_LINES,
            format!("host@{}", peer),
        );
        let leaving = Arc::new(AtomicBool::new(false));
        let commands = tokio::spawn(remote_command_loop(
            Arc::clone(&agent),
            channel.clone(),
            requests,
            Arc::clone(&leaving),
        ));

        log::info!("{} joined the lobby at {}", agent.name(), peer);
        Ok(Self {
            agent,
            channel,
            remaining_at_join,
            commands,
            leaving,
        })
    }

    pub fn agent(&self) -> &Arc<PlayerAgent> {
        &self.agent
    }

    /// Countdown value the host reported when we joined.
    pub fn remaining_at_join(&self) -> u32 {
        self.remaining_at_join
    }

    pub fn is_connected(&self) -> bool {
        !self.channel.is_closed()
    }

    /// Resolves once the connection to the host is gone.
    pub async fn closed(&self) {
        self.channel.closed().await;
    }

    async fn host(
        &self,
        command: HostCommand,
        target: &str,
        argument: &str,
    ) -> Result<String, GuestError> {
        Ok(self.channel.host(target, command, argument).await?)
    }

    pub async fn remaining_time(&self) -> Result<u32, GuestError> {
        let reply = self
            .host(HostCommand::GetRemainingTime, self.agent.name(), "")
            .await?;
        reply
            .trim()
            .parse()
            .map_err(|_| GuestError::UnexpectedReply(reply))
    }

    pub async fn guess_room(&self, hider: &str, room: &str) -> Result<bool, GuestError> {
        Ok(self.agent.guess_room(&self.channel, hider, room).await?)
    }

    pub async fn view_maps(&self) -> Result<HashMap<String, Map>, GuestError> {
        Ok(self.agent.view_maps(&self.channel).await?)
    }

    pub async fn hider_position(&self, hider: &str) -> Result<Room, GuestError> {
        let reply = self
            .host(HostCommand::GetHiderPosition, self.agent.name(), hider.trim())
            .await?;
        Ok(serde_json::from_str(&reply).unwrap_or_default())
    }

    /// Asks the host to end the running game. `false` if none was running.
    pub async fn end_game(&self) -> Result<bool, GuestError> {
        let reply = self.host(HostCommand::EndGame, self.agent.name(), "").await?;
        Ok(decode_bool(&reply).unwrap_or(false))
    }

    /// Asks the host to remove `name` from the lobby.
    pub async fn kick(&self, name: &str) -> Result<bool, GuestError> {
        let reply = self.host(HostCommand::Disconnect, name.trim(), "").await?;
        Ok(decode_bool(&reply).unwrap_or(false))
    }

    /// Leaves the lobby.
    pub async fn disconnect(self) -> Result<(), GuestError> {
        self.leaving.store(true, Ordering::SeqCst);
        let result = self
            .channel
            .host(self.agent.name(), HostCommand::Disconnect, "")
            .await;
        self.channel.close().await;
        self.agent.handle(RemoteCommand::EndGame, "").await;
        let _ = self.commands.await;
        log::info!("{} left the lobby", self.agent.name());

        match result {
            // The host may hang up before answering.
            Ok(_) | Err(ChannelError::Closed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn remote_command_loop(
    agent: Arc<PlayerAgent>,
    channel: CommandChannel,
    mut requests: Requests,
    leaving: Arc<AtomicBool>,
) {
    while let Some(request) = requests.recv().await {
        let Ok([command, argument]) = <[String; REMOTE_REQUEST_LINES]>::try_from(request) else {
            continue;
        };
        let result = agent.handle_raw(&command, &argument).await;
        if let Err(e) = channel.respond(&result).await {
            log::debug!("{}: {}", channel.label(), e);
            break;
        }
    }

    if !leaving.load(Ordering::SeqCst) {
        agent.connection_lost();
    }
}
