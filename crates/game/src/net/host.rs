use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::watch;
use tokio::time;

use super::channel::{CommandChannel, Requests};
use super::dispatch::ChannelDispatch;
use super::protocol::{HOST_REQUEST_LINES, JoinReply};
use crate::lobby::{Joined, Lobby};

/// Accepts players into a lobby over TCP.
pub struct Host {
    lobby: Lobby,
    listener: TcpListener,
    closing: Arc<watch::Sender<bool>>,
}

/// Lets other tasks stop a running [`Host`] from accepting players.
#[derive(Clone)]
pub struct HostHandle {
    closing: Arc<watch::Sender<bool>>,
}

impl HostHandle {
    /// Stops accepting new players. Players already in the lobby stay.
    pub fn close_lobby(&self) {
        if !self.closing.send_replace(true) {
            log::info!("lobby closed to new players");
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.closing.borrow()
    }
}

impl Host {
    pub async fn bind(addr: impl ToSocketAddrs, lobby: Lobby) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let (closing, _) = watch::channel(false);
        Ok(Self {
            lobby,
            listener,
            closing: Arc::new(closing),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    pub fn handle(&self) -> HostHandle {
        HostHandle {
            closing: Arc::clone(&self.closing),
        }
    }

    pub fn close_lobby(&self) {
        self.handle().close_lobby();
    }

    /// Accepts connections until the lobby is closed or disbanded.
    pub async fn run(self) {
        match self.listener.local_addr() {
            Ok(addr) => log::info!("accepting players on {}", addr),
            Err(_) => log::info!("accepting players"),
        }

        let mut closing = self.closing.subscribe();
        loop {
            tokio::select! {
                _ = async { let _ = closing.wait_for(|closed| *closed).await; } => break,
                _ = self.lobby.disbanded() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        log::debug!("connection from {}", addr);
                        tokio::spawn(serve_connection(self.lobby.clone(), stream, addr));
                    }
                    Err(e) => {
                        log::warn!("accept failed: {}", e);
                        time::sleep(Duration::from_millis(100)).await;
                    }
                },
            }
        }
        log::debug!("accept loop stopped");
    }
}

async fn serve_connection(lobby: Lobby, stream: TcpStream, addr: SocketAddr) {
    let _ = stream.set_nodelay(true);
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let mut line = String::new();
    let timeout = lobby.settings().handshake_timeout;
    match time::timeout(timeout, reader.read_line(&mut line)).await {
        Ok(Ok(0)) => {
            log::debug!("{} left before the handshake", addr);
            return;
        }
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            log::warn!("handshake with {} failed: {}", addr, e);
            return;
        }
        Err(_) => {
            log::warn!("{} did not identify itself in time", addr);
            return;
        }
    }

    let name = line.trim().to_string();
    let label = format!("{}@{}", name, addr);
    let (channel, requests) = CommandChannel::spawn(reader, write_half, HOST_REQUEST_LINES, label);

    let Some(joined) = admit(&lobby, &channel, &name).await else {
        channel.close().await;
        return;
    };

    host_command_loop(&lobby, &channel, requests).await;

    lobby.drop_connection(joined.id).await;
    channel.close().await;
}

/// Registers the participant and answers the handshake. Nothing else is
/// written to the connection until the answer is out.
async fn admit(lobby: &Lobby, channel: &CommandChannel, name: &str) -> Option<Joined> {
    let mut raw = channel.raw_writer().await;
    let dispatch = Arc::new(ChannelDispatch::new(channel.clone()));

    let (joined, reply) = match lobby.join(name, dispatch).await {
        Ok(joined) => (
            Some(joined),
            JoinReply::Accepted {
                remaining_secs: joined.remaining_secs,
            },
        ),
        Err(e) => {
            log::info!("{}: join refused: {}", channel.label(), e);
            (None, JoinReply::Rejected)
        }
    };

    if let Err(e) = raw.write_line(&reply.encode()).await {
        log::warn!("{}: could not answer the handshake: {}", channel.label(), e);
        drop(raw);
        if let Some(joined) = joined {
            lobby.drop_connection(joined.id).await;
        }
        return None;
    }
    joined
}

async fn host_command_loop(lobby: &Lobby, channel: &CommandChannel, mut requests: Requests) {
    loop {
        let request = tokio::select! {
            request = requests.recv() => request,
            _ = lobby.disbanded() => break,
        };
        let Some(request) = request else {
            break;
        };
        let Ok([target, command, argument]) = <[String; HOST_REQUEST_LINES]>::try_from(request)
        else {
            continue;
        };

        let result = lobby.handle_host_command(&target, &command, &argument).await;
        if let Err(e) = channel.respond(&result).await {
            log::debug!("{}: {}", channel.label(), e);
            break;
        }
    }
}
