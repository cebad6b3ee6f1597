use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ScreenCueError;

/// A physical screen coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Parses `X,Y`, optionally wrapped in parentheses.
impl FromStr for Point {
    type Err = ScreenCueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScreenCueError::InvalidRequest(format!("invalid point '{s}', expected X,Y"));
        let inner = s.trim().trim_start_matches('(').trim_end_matches(')');
        let (x, y) = inner.split_once(',').ok_or_else(invalid)?;
        Ok(Self {
            x: x.trim().parse().map_err(|_| invalid())?,
            y: y.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// A screen rectangle in physical pixels. The origin may be negative on
/// multi-monitor layouts; the size is always non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Crop geometry in `WxH+X+Y` form, as understood by GraphicsMagick.
    pub fn crop_geometry(&self) -> String {
        format!("{}x{}{:+}{:+}", self.width, self.height, self.x, self.y)
    }

    pub fn center(&self) -> Point {
        let half = |extent: u32| i32::try_from(extent / 2).unwrap_or(i32::MAX);
        Point {
            x: self.x.saturating_add(half(self.width)),
            y: self.y.saturating_add(half(self.height)),
        }
    }
}

/// Same `X,Y WxH` form the region selector prints.
impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}
