mod config;
mod console;
mod events;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use config::HostConfig;
use console::Command;
use hidenseek::{
    Host, HostHandle, LocalDispatch, Lobby, LobbySettings, Map, PathTracker, PlayerAgent, Role,
};

#[derive(Parser)]
#[command(name = "hidenseek-host")]
#[command(about = "Host a hide and seek lobby")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = hidenseek::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, help = "Identifier of the host's own participant")]
    name: String,

    #[arg(long, help = "Play as a hider instead of a seeker")]
    hider: bool,

    #[arg(short = 't', long, default_value_t = 300, help = "Hiding time in seconds")]
    hiding_time: u32,

    #[arg(long, help = "Motion sensors as device=room pairs, comma separated")]
    devices: Option<String>,

    #[arg(long, help = "Floorplan image for the host's map")]
    floorplan: Option<String>,
}

struct Session {
    lobby: Lobby,
    handle: HostHandle,
    agent: Arc<PlayerAgent>,
    tracker: Arc<PathTracker>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = HostConfig {
        bind_addr: format!("{}:{}", args.bind, args.port),
        name: args.name,
        role: if args.hider { Role::Hider } else { Role::Seeker },
        devices: args.devices,
        floorplan: args.floorplan,
        lobby: LobbySettings {
            hiding_secs: args.hiding_time,
            ..Default::default()
        },
    };

    let (agent, tracker) = config.agent().await?;
    let lobby = Lobby::new(
        config.lobby.clone(),
        &config.name,
        config.role,
        Arc::new(LocalDispatch::new(agent.clone())),
    )?;
    let host = Host::bind(&config.bind_addr, lobby.clone()).await?;
    log::info!("Lobby open on {}", host.local_addr()?);

    let session = Session {
        lobby: lobby.clone(),
        handle: host.handle(),
        agent,
        tracker,
    };
    tokio::spawn(events::print_events(lobby.subscribe()));
    let accept_loop = tokio::spawn(host.run());

    println!("{}", console::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = lobby.disbanded() => break,
        };
        let Some(line) = line else {
            break;
        };

        match console::parse(&line) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(e) = run_command(&session, command).await {
                    println!("! {:#}", e);
                }
            }
            Ok(None) => {}
            Err(e) => println!("! {:#}", e),
        }
    }

    log::info!("Shutting down");
    lobby.disband().await;
    let _ = tokio::time::timeout(Duration::from_secs(1), accept_loop).await;
    Ok(())
}

async fn run_command(session: &Session, command: Command) -> Result<()> {
    let lobby = &session.lobby;
    match command {
        Command::Start => lobby.start_game().await?,
        Command::End => lobby.end_game().await?,
        Command::Reset => lobby.reset().await?,
        Command::Time(seconds) => lobby.set_hiding_time(seconds).await?,
        Command::SetRole { name, role } => lobby.set_role(&name, role).await?,
        Command::Players => {
            println!(
                "{} with {}s left",
                lobby.phase().await,
                lobby.remaining_secs().await
            );
            for player in lobby.participants().await {
                println!(
                    "  #{} {:<12} {:<6} {:>4} pts{}{}{}",
                    player.id,
                    player.name,
                    player.role.as_str(),
                    player.score,
                    if player.is_host { " host" } else { "" },
                    if player.found { " found" } else { "" },
                    if player.local { "" } else { " remote" },
                );
            }
        }
        Command::Guess { hider, room } => {
            let hit = session.agent.guess_room(lobby, &hider, &room).await?;
            println!("{}", if hit { "found!" } else { "not there" });
        }
        Command::Maps => {
            let maps = session.agent.view_maps(lobby).await?;
            if maps.is_empty() {
                println!("no hidden hiders");
            }
            for (hider, map) in maps {
                let rooms: Vec<&str> = map.room_names().collect();
                println!("  {}: {}", hider, rooms.join(", "));
            }
        }
        Command::Where(hider) => {
            let room = lobby.hider_location(&hider).await?;
            if room.is_unknown() {
                println!("{} is nowhere to be seen", hider);
            } else {
                println!("{} is in {}", hider, room.name);
            }
        }
        Command::Kick(name) => {
            if !lobby.disconnect(&name).await {
                println!("no participant named {}", name);
            }
        }
        Command::Move(device) => session.tracker.activate(&device).await?,
        Command::MapAdd(room) => edit_map(session, |map| map.add_room(room)).await??,
        Command::MapRemove(name) => {
            edit_map(session, |map| map.remove_room(&name)).await??;
        }
        Command::MapClear => edit_map(session, |map| map.reset()).await?,
        Command::MapShow => {
            let map = session
                .agent
                .map()
                .await
                .ok_or_else(|| anyhow::anyhow!("only hiders have a map"))?;
            if let Some(floorplan) = map.floorplan() {
                println!("floorplan {}", floorplan);
            }
            for room in map.rooms() {
                println!("  {} {:?}", room.name, room.bounds);
            }
        }
        Command::Close => session.handle.close_lobby(),
        Command::Help => println!("{}", console::HELP),
        Command::Quit => {}
    }
    Ok(())
}

async fn edit_map<R>(
    session: &Session,
    edit: impl FnOnce(&mut Map) -> R,
) -> Result<R> {
    session
        .agent
        .edit_map(edit)
        .await
        .ok_or_else(|| anyhow::anyhow!("only hiders have a map"))
}
