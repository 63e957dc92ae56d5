//! Core value types for the board grid.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Instance id of a placed component. Assigned in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Id of a net on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetId(pub u32);

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net{}", self.0)
    }
}

/// Id of a routed trace segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId(pub u32);

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trace{}", self.0)
    }
}

/// Integer cell coordinate on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub const ORIGIN: GridPosition = GridPosition { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Taxicab distance between two cells.
    pub fn manhattan_distance(&self, other: GridPosition) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The four orthogonal neighbours, in N, E, S, W order.
    pub fn neighbors(&self) -> [GridPosition; 4] {
        [
            GridPosition::new(self.x, self.y + 1),
            GridPosition::new(self.x + 1, self.y),
            GridPosition::new(self.x, self.y - 1),
            GridPosition::new(self.x - 1, self.y),
        ]
    }

    /// True when both points share a row or a column.
    pub fn is_aligned_with(&self, other: GridPosition) -> bool {
        self.x == other.x || self.y == other.y
    }
}

impl Add for GridPosition {
    type Output = GridPosition;

    fn add(self, rhs: GridPosition) -> GridPosition {
        GridPosition::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for GridPosition {
    type Output = GridPosition;

    fn sub(self, rhs: GridPosition) -> GridPosition {
        GridPosition::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Component orientation in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    /// Parse a multiple of 90 degrees. Negative and >= 360 values wrap.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(&self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Rotate a local offset into board orientation.
    ///
    /// 90° maps (x, y) to (y, -x); 180° to (-x, -y); 270° to (-y, x).
    pub fn apply(&self, local: GridPosition) -> GridPosition {
        match self {
            Rotation::Deg0 => local,
            Rotation::Deg90 => GridPosition::new(local.y, -local.x),
            Rotation::Deg180 => GridPosition::new(-local.x, -local.y),
            Rotation::Deg270 => GridPosition::new(-local.y, local.x),
        }
    }
}

/// Axis-aligned rectangle in grid space. `min` is inclusive, `max` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardBounds {
    pub min: GridPosition,
    pub max: GridPosition,
}

impl BoardBounds {
    pub fn new(min: GridPosition, max: GridPosition) -> Self {
        Self { min, max }
    }

    /// Bounds covering the whole grid.
    pub fn unbounded() -> Self {
        Self {
            min: GridPosition::new(i32::MIN, i32::MIN),
            max: GridPosition::new(i32::MAX, i32::MAX),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        *self == Self::unbounded()
    }

    /// Smallest bounds containing every point, or `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = GridPosition>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let far = GridPosition::new(first.x.saturating_add(1), first.y.saturating_add(1));
        let mut bounds = Self::new(first, far);
        for p in iter {
            bounds.expand_to_include(p);
        }
        Some(bounds)
    }

    pub fn expand_to_include(&mut self, p: GridPosition) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x.saturating_add(1));
        self.max.y = self.max.y.max(p.y.saturating_add(1));
    }

    pub fn contains(&self, p: GridPosition) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    pub fn width(&self) -> u32 {
        self.max.x.abs_diff(self.min.x)
    }

    pub fn height(&self) -> u32 {
        self.max.y.abs_diff(self.min.y)
    }

    pub fn union(&self, other: &BoardBounds) -> BoardBounds {
        BoardBounds {
            min: GridPosition::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: GridPosition::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }
}
