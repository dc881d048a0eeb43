use glam::IVec2;
use serde::{Deserialize, Serialize};

/// A named room on a hider's floorplan.
///
/// `bounds` holds two diagonal corners of the room's rectangle relative to
/// the floorplan image. Rooms placed without a location keep both corners at
/// the origin.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    #[serde(default)]
    pub bounds: [IVec2; 2],
}

impl Room {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bounds: [IVec2::ZERO; 2],
        }
    }

    pub fn with_bounds(name: impl Into<String>, first: IVec2, second: IVec2) -> Self {
        Self {
            name: name.into(),
            bounds: [first, second],
        }
    }

    /// An unnamed room stands for "position unknown".
    pub fn is_unknown(&self) -> bool {
        self.name.is_empty()
    }

    pub fn area(&self) -> i64 {
        let size = (self.bounds[1] - self.bounds[0]).abs();
        size.x as i64 * size.y as i64
    }

    pub fn contains(&self, point: IVec2) -> bool {
        let min = self.bounds[0].min(self.bounds[1]);
        let max = self.bounds[0].max(self.bounds[1]);
        point.cmpge(min).all() && point.cmple(max).all()
    }
}
