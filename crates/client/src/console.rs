use anyhow::{Context, Result, bail};
use glam::IVec2;
use hidenseek::Room;

pub const HELP: &str = "\
commands:
  status                     show score and game state
  time                       ask the host for the time left to hide
  guess <hider> <room>       guess where a hider is
  maps                       show the maps of hiders still hidden
  where <hider>              show the room a hider is in
  end                        ask the host to end the game
  kick <name>                ask the host to remove a participant
  move <device>              report a sensor on this player's trail
  map add <room> [x1 y1 x2 y2]
  map remove <room>
  map clear
  map show
  quit                       leave the lobby";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Time,
    End,
    Guess { hider: String, room: String },
    Maps,
    Where(String),
    Kick(String),
    Move(String),
    MapAdd(Room),
    MapRemove(String),
    MapClear,
    MapShow,
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
        ("status", []) => Command::Status,
        ("time", []) => Command::Time,
        ("end", []) => Command::End,
        ("guess", [hider, room]) => Command::Guess {
            hider: hider.to_string(),
            room: room.to_string(),
        },
        ("maps", []) => Command::Maps,
        ("where", [hider]) => Command::Where(hider.to_string()),
        ("kick", [name]) => Command::Kick(name.to_string()),
        ("move", [device]) => Command::Move(device.to_string()),
        ("map", [sub, rest @ ..]) => parse_map(sub, rest)?,
        ("help", _) => Command::Help,
        ("quit" | "exit" | "leave", []) => Command::Quit,
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
