use anyhow::{Context, Result, anyhow, bail};
use glam::IVec2;
use hidenseek::{Role, Room};

pub const HELP: &str = "\
commands:
  start                      start a game
  end                        end the running game
  reset                      prepare another round after a game
  time <seconds>             set the hiding time
  role <name> <hider|seeker> change a participant's role
  players                    list participants
  guess <hider> <room>       guess where a hider is
  maps                       show the maps of hiders still hidden
  where <hider>              show the room a hider is in
  kick <name>                remove a participant
  move <device>              report a sensor on this host's trail
  map add <room> [x1 y1 x2 y2]
  map remove <room>
  map clear
  map show
  close                      stop accepting new players
  quit                       disband the lobby and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    End,
    Reset,
    Time(u32),
    SetRole { name: String, role: Role },
    Players,
    Guess { hider: String, room: String },
    Maps,
    Where(String),
    Kick(String),
    Move(String),
    MapAdd(Room),
    MapRemove(String),
    MapClear,
    MapShow,
    Close,
    Help,
    Quit,
}

/// Parses one console line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        return Ok(None);
    };

    let command = match (verb, args) {
        ("start", []) => Command::Start,
        ("end", []) => Command::End,
        ("reset", []) => Command::Reset,
        ("time", [seconds]) => Command::Time(
            seconds
                .parse()
                .with_context(|| format!("not a number of seconds: {}", seconds))?,
        ),
        ("role", [name, role]) => Command::SetRole {
            name: name.to_string(),
            role: Role::parse(role).ok_or_else(|| anyhow!("unknown role: {}", role))?,
        },
        ("players", []) => Command::Players,
        ("guess", [hider, room]) => Command::Guess {
            hider: hider.to_string(),
            room: room.to_string(),
        },
        ("maps", []) => Command::Maps,
        ("where", [hider]) => Command::Where(hider.to_string()),
        ("kick", [name]) => Command::Kick(name.to_string()),
        ("move", [device]) => Command::Move(device.to_string()),
        ("map", [sub, rest @ ..]) => parse_map(sub, rest)?,
        ("close", []) => Command::Close,
        ("help", _) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        _ => bail!("unknown command, try `help`"),
    };
    Ok(Some(command))
}

fn parse_map(sub: &str, args: &[&str]) -> Result<Command> {
    Ok(match (sub, args) {
        ("add", [name]) => Command::MapAdd(Room::new(*name)),
        ("add", [name, x1, y1, x2, y2]) => {
            let corner = |x: &str, y: &str| -> Result<IVec2> {
                Ok(IVec2::new(
                    x.parse().context("bad coordinate")?,
                    y.parse().context("bad coordinate")?,
                ))
            };
            Command::MapAdd(Room::with_bounds(*name, corner(*x1, *y1)?, corner(*x2, *y2)?))
        }
        ("remove", [name]) => Command::MapRemove(name.to_string()),
        ("clear", []) => Command::MapClear,
        ("show", []) => Command::MapShow,
        _ => bail!("usage: map add|remove|clear|show"),
    })
}
