//! Shape strategies: position classification inside a bounding box, size
//! limits, and the generic block predicates used for cells that hold no part.
//!
//! # Classification
//!
//! A cell is classified by how many of its three coordinates sit on an
//! extreme (min or max) of the box:
//!
//! | extremes | position        |
//! |----------|-----------------|
//! | 0        | `Interior`      |
//! | 1        | `Face(dir)`     |
//! | 2        | `Edge(axis)`    |
//! | 3        | `Corner`        |
//!
//! For faces, `dir` points outward along the matching axis. For edges, `axis`
//! is the open axis (the one *not* on an extreme), which is the axis the edge
//! runs along. A box that is one cell thick along an axis puts every cell on
//! both extremes of that axis; faces then point toward the minimum side.

use crate::id::BlockTypeId;
use crate::position::{Axis, BlockPos, BoundingBox, Direction};
use crate::validation::{ValidationError, ValidationReason};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// PartPosition
// ---------------------------------------------------------------------------

/// Where a cell sits relative to its structure's bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartPosition {
    Interior,
    /// On exactly one extreme; the direction points out of the structure.
    Face(Direction),
    /// On exactly two extremes; the axis is the one the edge runs along.
    Edge(Axis),
    Corner,
}

impl PartPosition {
    /// Classify `pos` inside the box spanned by `min` and `max`.
    ///
    /// Returns `None` when `pos` lies outside the box.
    pub fn classify(pos: BlockPos, min: BlockPos, max: BlockPos) -> Option<Self> {
        let bounds = BoundingBox::from_corners(min, max);
        if !bounds.contains(pos) {
            return None;
        }

        let mut extremes = 0;
        let mut face = None;
        let mut open = None;
        for axis in Axis::ALL {
            let at_min = pos.get(axis) == bounds.min.get(axis);
            let at_max = pos.get(axis) == bounds.max.get(axis);
            if at_min || at_max {
                extremes += 1;
                face = Some(Direction::from_axis(axis, !at_min));
            } else {
                open = Some(axis);
            }
        }

        Some(match (extremes, face, open) {
            (3, _, _) => PartPosition::Corner,
            (2, _, Some(axis)) => PartPosition::Edge(axis),
            (1, Some(dir), _) => PartPosition::Face(dir),
            _ => PartPosition::Interior,
        })
    }

    /// The coarse class used by placement and block predicates.
    pub fn class(&self) -> PositionClass {
        match self {
            PartPosition::Corner | PartPosition::Edge(_) => PositionClass::Frame,
            PartPosition::Face(Direction::Up) => PositionClass::Top,
            PartPosition::Face(Direction::Down) => PositionClass::Bottom,
            PartPosition::Face(_) => PositionClass::Sides,
            PartPosition::Interior => PositionClass::Interior,
        }
    }
}

/// Coarse grouping of [`PartPosition`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionClass {
    Frame,
    Top,
    Bottom,
    Sides,
    Interior,
}

// ---------------------------------------------------------------------------
// Placement (per-part predicate)
// ---------------------------------------------------------------------------

/// The position classes a part accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub frame: bool,
    pub top: bool,
    pub bottom: bool,
    pub sides: bool,
    pub interior: bool,
}

impl Placement {
    pub const ANYWHERE: Placement = Placement {
        frame: true,
        top: true,
        bottom: true,
        sides: true,
        interior: true,
    };

    /// Any cell on the outside of the structure.
    pub const SURFACE: Placement = Placement {
        frame: true,
        top: true,
        bottom: true,
        sides: true,
        interior: false,
    };

    /// Faces only, never edges or corners (ports, windows, controllers).
    pub const FACES: Placement = Placement {
        frame: false,
        top: true,
        bottom: true,
        sides: true,
        interior: false,
    };

    pub const FRAME: Placement = Placement {
        frame: true,
        top: false,
        bottom: false,
        sides: false,
        interior: false,
    };

    pub const INTERIOR: Placement = Placement {
        frame: false,
        top: false,
        bottom: false,
        sides: false,
        interior: true,
    };

    pub fn accepts(&self, position: PartPosition) -> bool {
        match position.class() {
            PositionClass::Frame => self.frame,
            PositionClass::Top => self.top,
            PositionClass::Bottom => self.bottom,
            PositionClass::Sides => self.sides,
            PositionClass::Interior => self.interior,
        }
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::ANYWHERE
    }
}

// ---------------------------------------------------------------------------
// Block predicates (cells without a part)
// ---------------------------------------------------------------------------

/// Accepts a set of block types, and optionally an empty cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockFilter {
    pub blocks: BTreeSet<BlockTypeId>,
    pub allow_empty: bool,
}

impl BlockFilter {
    /// Rejects everything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Only an empty cell.
    pub fn empty() -> Self {
        Self {
            blocks: BTreeSet::new(),
            allow_empty: true,
        }
    }

    pub fn any_of<I: IntoIterator<Item = BlockTypeId>>(blocks: I) -> Self {
        Self {
            blocks: blocks.into_iter().collect(),
            allow_empty: false,
        }
    }

    pub fn or_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    pub fn accepts(&self, block: Option<BlockTypeId>) -> bool {
        match block {
            None => self.allow_empty,
            Some(block) => self.blocks.contains(&block),
        }
    }
}

/// Generic per-class predicates for cells that hold no part of the
/// structure's kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRules {
    pub frame: BlockFilter,
    pub top: BlockFilter,
    pub bottom: BlockFilter,
    pub sides: BlockFilter,
    pub interior: BlockFilter,
}

impl BlockRules {
    /// Only parts are accepted on the surface; the interior must be empty.
    pub fn parts_only() -> Self {
        Self {
            interior: BlockFilter::empty(),
            ..Self::default()
        }
    }

    pub fn filter(&self, class: PositionClass) -> &BlockFilter {
        match class {
            PositionClass::Frame => &self.frame,
            PositionClass::Top => &self.top,
            PositionClass::Bottom => &self.bottom,
            PositionClass::Sides => &self.sides,
            PositionClass::Interior => &self.interior,
        }
    }

    pub fn accepts(&self, position: PartPosition, block: Option<BlockTypeId>) -> bool {
        self.filter(position.class()).accepts(block)
    }
}

// ---------------------------------------------------------------------------
// Geometry strategy
// ---------------------------------------------------------------------------

/// Shape family of a structure kind. Parts only merge within one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryFamily {
    /// Solid box: every cell is validated, interior cells included.
    Cuboid,
    /// Rectangular shell: the surface is validated like a cuboid and the
    /// interior must be hollow (no part, no block).
    Shell,
}

/// Per-axis cell counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisSizes {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl AxisSizes {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    pub const fn uniform(size: u32) -> Self {
        Self::new(size, size, size)
    }

    pub fn get(&self, axis: Axis) -> u32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// Shape rules for one structure kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub family: GeometryFamily,
    pub min_size: AxisSizes,
    pub max_size: AxisSizes,
    pub min_parts: usize,
}

impl Geometry {
    pub fn cuboid(min_size: AxisSizes, max_size: AxisSizes) -> Self {
        Self {
            family: GeometryFamily::Cuboid,
            min_size,
            max_size,
            min_parts: 1,
        }
    }

    pub fn shell(min_size: AxisSizes, max_size: AxisSizes) -> Self {
        Self {
            family: GeometryFamily::Shell,
            min_size,
            max_size,
            min_parts: 1,
        }
    }

    pub fn with_min_parts(mut self, min_parts: usize) -> Self {
        self.min_parts = min_parts;
        self
    }

    /// Classify a cell against `bounds`. Same rule for every family.
    pub fn classify(&self, pos: BlockPos, bounds: &BoundingBox) -> Option<PartPosition> {
        PartPosition::classify(pos, bounds.min, bounds.max)
    }

    /// Whether interior cells must be empty instead of checked against the
    /// interior block predicate.
    pub fn requires_hollow_interior(&self) -> bool {
        self.family == GeometryFamily::Shell
    }

    /// Fast checks on part count and per-axis size, before any cell scan.
    pub fn validate_shape(&self, bounds: &BoundingBox, part_count: usize) -> Result<(), ValidationError> {
        if part_count < self.min_parts {
            return Err(ValidationError::general(ValidationReason::TooFewParts {
                min: self.min_parts,
                actual: part_count,
            }));
        }

        for axis in Axis::ALL {
            let size = bounds.size(axis);
            let min = self.min_size.get(axis);
            let max = self.max_size.get(axis);
            if size < min {
                return Err(ValidationError::general(ValidationReason::TooSmall { axis, size, min }));
            }
            if size > max {
                return Err(ValidationError::general(ValidationReason::TooLarge { axis, size, max }));
            }
        }

        Ok(())
    }
}
