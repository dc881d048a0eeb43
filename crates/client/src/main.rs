mod config;
mod console;
mod events;

use anyhow::{Result, anyhow};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use config::GuestConfig;
use console::Command;
use hidenseek::{Guest, GuestError, Map, PathTracker, Role};

#[derive(Parser)]
#[command(name = "hidenseek-guest")]
#[command(about = "Join a hide and seek lobby")]
struct Args {
    #[arg(
        short,
        long,
        default_value = "127.0.0.1",
        help = "Host to connect to (e.g., 192.168.1.20)"
    )]
    server: String,

    #[arg(short, long, default_value_t = hidenseek::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, help = "Identifier to join with")]
    name: String,

    #[arg(long, help = "Play as a hider; the host assigns the role in the lobby")]
    hider: bool,

    #[arg(long, help = "Motion sensors as device=room pairs, comma separated")]
    devices: Option<String>,

    #[arg(long, help = "Floorplan image for this player's map")]
    floorplan: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = GuestConfig {
        server_addr: format!("{}:{}", args.server, args.port),
        name: args.name,
        role: if args.hider { Role::Hider } else { Role::Seeker },
        devices: args.devices,
        floorplan: args.floorplan,
    };

    let (agent, tracker) = config.agent().await?;
    tokio::spawn(events::print_events(agent.subscribe()));

    let guest = match Guest::connect(&config.server_addr, agent).await {
        Ok(guest) => guest,
        Err(GuestError::NameTaken) => {
            return Err(anyhow!("the name {} is already in use", config.name));
        }
        Err(e) => return Err(e.into()),
    };
    match guest.remaining_at_join() {
        0 => println!("joined the lobby"),
        secs => println!("joined the lobby, {}s left to hide", secs),
    }

    println!("{}", console::HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = guest.closed() => break,
        };
        let Some(line) = line else {
            break;
        };

        match console::parse(&line) {
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(e) = run_command(&guest, &tracker, command).await {
                    println!("! {:#}", e);
                }
            }
            Ok(None) => {}
            Err(e) => println!("! {:#}", e),
        }
    }

    if guest.is_connected() {
        guest.disconnect().await?;
    }
    Ok(())
}

async fn run_command(guest: &Guest, tracker: &PathTracker, command: Command) -> Result<()> {
    let agent = guest.agent();
    match command {
        Command::Status => {
            println!(
                "{} as {}, {} points, {}",
                agent.name(),
                agent.role().await,
                agent.score(),
                if agent.is_active() { "playing" } else { "waiting" }
            );
        }
        Command::Time => println!("{}s left to hide", guest.remaining_time().await?),
        Command::End => {
            if !guest.end_game().await? {
                println!("no game is running");
            }
        }
        Command::Guess { hider, room } => {
            let hit = guest.guess_room(&hider, &room).await?;
            println!("{}", if hit { "found!" } else { "not there" });
        }
        Command::Maps => {
            let maps = guest.view_maps().await?;
            if maps.is_empty() {
                println!("no hidden hiders");
            }
            for (hider, map) in maps {
                let rooms: Vec<&str> = map.room_names().collect();
                println!("  {}: {}", hider, rooms.join(", "));
            }
        }
        Command::Where(hider) => {
            let room = guest.hider_position(&hider).await?;
            if room.is_unknown() {
                println!("{} is nowhere to be seen", hider);
            } else {
                println!("{} is in {}", hider, room.name);
            }
        }
        Command::Kick(name) => {
            if !guest.kick(&name).await? {
                println!("no participant named {}", name);
            }
        }
        Command::Move(device) => tracker.activate(&device).await?,
        Command::MapAdd(room) => edit_map(guest, |map| map.add_room(room)).await??,
        Command::MapRemove(name) => {
            edit_map(guest, |map| map.remove_room(&name)).await??;
        }
        Command::MapClear => edit_map(guest, |map| map.reset()).await?,
        Command::MapShow => {
            let map = agent
                .map()
                .await
                .ok_or_else(|| anyhow!("only hiders have a map"))?;
            if let Some(floorplan) = map.floorplan() {
                println!("floorplan {}", floorplan);
            }
            for room in map.rooms() {
                println!("  {} {:?}", room.name, room.bounds);
            }
        }
        Command::Help => println!("{}", console::HELP),
        Command::Quit => {}
    }
    Ok(())
}

async fn edit_map<R>(guest: &Guest, edit: impl FnOnce(&mut Map) -> R) -> Result<R> {
    guest
        .agent()
        .edit_map(edit)
        .await
        .ok_or_else(|| anyhow!("only hiders have a map"))
}
