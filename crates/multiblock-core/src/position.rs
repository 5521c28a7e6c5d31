//! Integer grid positions, axes, face directions and axis-aligned boxes.
//!
//! The grid is Y-up: `Up`/`Down` move along Y, `North`/`South` along Z and
//! `West`/`East` along X.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A cell position on the 3D grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Coordinate along a single axis.
    pub fn get(&self, axis: Axis) -> i32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// The neighboring cell one step in `dir`, or `None` past the `i32`
    /// limits.
    pub fn offset(&self, dir: Direction) -> Option<Self> {
        let (dx, dy, dz) = dir.offset();
        Some(Self::new(
            self.x.checked_add(dx)?,
            self.y.checked_add(dy)?,
            self.z.checked_add(dz)?,
        ))
    }

    /// The face-adjacent cells that exist, in [`Direction::ALL`] order.
    pub fn neighbors(self) -> impl Iterator<Item = BlockPos> {
        Direction::ALL.into_iter().filter_map(move |dir| self.offset(dir))
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One of the three grid axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(name)
    }
}

/// The six face directions of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// Unit offset for this direction.
    pub fn offset(&self) -> (i32, i32, i32) {
        match self {
            Direction::Down => (0, -1, 0),
            Direction::Up => (0, 1, 0),
            Direction::North => (0, 0, -1),
            Direction::South => (0, 0, 1),
            Direction::West => (-1, 0, 0),
            Direction::East => (1, 0, 0),
        }
    }

    /// The direction pointing toward the larger coordinate of `axis` when
    /// `positive`, toward the smaller one otherwise.
    pub fn from_axis(axis: Axis, positive: bool) -> Self {
        match (axis, positive) {
            (Axis::Y, false) => Direction::Down,
            (Axis::Y, true) => Direction::Up,
            (Axis::Z, false) => Direction::North,
            (Axis::Z, true) => Direction::South,
            (Axis::X, false) => Direction::West,
            (Axis::X, true) => Direction::East,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Down => "bottom",
            Direction::Up => "top",
            Direction::North => "north",
            Direction::South => "south",
            Direction::West => "west",
            Direction::East => "east",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// BoundingBox
// ---------------------------------------------------------------------------

/// An axis-aligned box with inclusive `min` and `max` corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: BlockPos,
    pub max: BlockPos,
}

impl BoundingBox {
    /// A box covering a single cell.
    pub fn from_point(pos: BlockPos) -> Self {
        Self { min: pos, max: pos }
    }

    /// A box spanning two corners given in any order.
    pub fn from_corners(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// The minimal box containing every position, or `None` if empty.
    pub fn enclosing<I: IntoIterator<Item = BlockPos>>(positions: I) -> Option<Self> {
        let mut iter = positions.into_iter();
        let mut bounds = Self::from_point(iter.next()?);
        for pos in iter {
            bounds.include(pos);
        }
        Some(bounds)
    }

    /// Grow the box so it contains `pos`.
    pub fn include(&mut self, pos: BlockPos) {
        self.min = BlockPos::new(self.min.x.min(pos.x), self.min.y.min(pos.y), self.min.z.min(pos.z));
        self.max = BlockPos::new(self.max.x.max(pos.x), self.max.y.max(pos.y), self.max.z.max(pos.z));
    }

    /// Grow the box so it contains `other`.
    pub fn union(&mut self, other: &BoundingBox) {
        self.include(other.min);
        self.include(other.max);
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        Axis::ALL
            .iter()
            .all(|&axis| pos.get(axis) >= self.min.get(axis) && pos.get(axis) <= self.max.get(axis))
    }

    /// Number of cells spanned along `axis`.
    pub fn size(&self, axis: Axis) -> u32 {
        self.max.get(axis).abs_diff(self.min.get(axis)).saturating_add(1)
    }

    /// Total number of cells inside the box.
    pub fn volume(&self) -> u64 {
        Axis::ALL.iter().map(|&axis| self.size(axis) as u64).product()
    }

    /// Iterate over every cell inside the box, x fastest, then z, then y.
    pub fn positions(&self) -> impl Iterator<Item = BlockPos> {
        let min = self.min;
        let max = self.max;
        (min.y..=max.y).flat_map(move |y| {
            (min.z..=max.z).flat_map(move |z| (min.x..=max.x).map(move |x| BlockPos::new(x, y, z)))
        })
    }
}
