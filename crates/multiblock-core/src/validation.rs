//! Whole-structure validation.
//!
//! An unassembled structure is a normal steady state, so validation reports
//! through [`ValidationError`] values rather than failing loudly. The scan
//! stops at the first bad cell and [`FirstError`] keeps the first error
//! recorded for diagnostics.

use crate::catalog::KindDef;
use crate::grid::BlockGrid;
use crate::id::{ControllerId, KindId};
use crate::part::PartArena;
use crate::geometry::PartPosition;
use crate::position::{Axis, BlockPos, BoundingBox, Direction};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why a structure is not whole.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationReason {
    #[error("structure has no parts")]
    Empty,
    #[error("structure needs at least {min} parts, has {actual}")]
    TooFewParts { min: usize, actual: usize },
    #[error("structure is too small along {axis}: {size} < {min}")]
    TooSmall { axis: Axis, size: u32, min: u32 },
    #[error("structure is too large along {axis}: {size} > {max}")]
    TooLarge { axis: Axis, size: u32, max: u32 },
    #[error("cell is not loaded")]
    Unloaded,
    #[error("part belongs to another structure")]
    ForeignPart,
    #[error("part cannot be placed at a corner")]
    InvalidForCorner,
    #[error("part cannot be placed on the frame")]
    InvalidForFrame,
    #[error("part cannot be placed on the {0} face")]
    InvalidForFace(Direction),
    #[error("part cannot be placed inside the structure")]
    InvalidForInterior,
    #[error("block is not valid for the frame")]
    InvalidBlockForFrame,
    #[error("block is not valid for the top")]
    InvalidBlockForTop,
    #[error("block is not valid for the bottom")]
    InvalidBlockForBottom,
    #[error("block is not valid for the sides")]
    InvalidBlockForSides,
    #[error("block is not valid for the interior")]
    InvalidBlockForInterior,
    #[error("interior must be hollow")]
    NotHollow,
}

impl ValidationReason {
    /// Reason used when a part rejects its classified position.
    pub fn part_rejected(position: PartPosition) -> Self {
        match position {
            PartPosition::Corner => ValidationReason::InvalidForCorner,
            PartPosition::Edge(_) => ValidationReason::InvalidForFrame,
            PartPosition::Face(dir) => ValidationReason::InvalidForFace(dir),
            PartPosition::Interior => ValidationReason::InvalidForInterior,
        }
    }

    /// Reason used when a plain block fails the predicate for its position.
    pub fn block_rejected(position: PartPosition) -> Self {
        match position {
            PartPosition::Corner | PartPosition::Edge(_) => ValidationReason::InvalidBlockForFrame,
            PartPosition::Face(Direction::Up) => ValidationReason::InvalidBlockForTop,
            PartPosition::Face(Direction::Down) => ValidationReason::InvalidBlockForBottom,
            PartPosition::Face(_) => ValidationReason::InvalidBlockForSides,
            PartPosition::Interior => ValidationReason::InvalidBlockForInterior,
        }
    }
}

/// A validation failure, optionally tagged with the offending cell.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct ValidationError {
    pub position: Option<BlockPos>,
    pub reason: ValidationReason,
}

impl ValidationError {
    /// A failure of the structure as a whole.
    pub fn general(reason: ValidationReason) -> Self {
        Self {
            position: None,
            reason,
        }
    }

    /// A failure at a specific cell.
    pub fn at(position: BlockPos, reason: ValidationReason) -> Self {
        Self {
            position: Some(position),
            reason,
        }
    }
}

/// Single-slot accumulator: the first recorded error is never overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirstError {
    slot: Option<ValidationError>,
}

impl FirstError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `error` unless one is already held. Returns whether it was kept.
    pub fn record(&mut self, error: ValidationError) -> bool {
        if self.slot.is_some() {
            return false;
        }
        self.slot = Some(error);
        true
    }

    pub fn is_set(&self) -> bool {
        self.slot.is_some()
    }

    pub fn get(&self) -> Option<&ValidationError> {
        self.slot.as_ref()
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        match self.slot {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Cell scan
// ---------------------------------------------------------------------------

/// Scan every cell of `bounds` for the structure owned by `owner`.
///
/// Cells holding a part of `kind_id` must belong to `owner` and accept their
/// classified position. Any other cell is checked against the kind's block
/// rules (or must be empty, for hollow interiors).
pub fn scan_structure<G: BlockGrid + ?Sized>(
    owner: ControllerId,
    kind_id: KindId,
    kind: &KindDef,
    bounds: &BoundingBox,
    parts: &PartArena,
    grid: &G,
) -> Result<(), ValidationError> {
    let mut first = FirstError::new();
    for pos in bounds.positions() {
        if let Err(error) = check_cell(owner, kind_id, kind, bounds, parts, grid, pos) {
            first.record(error);
            break;
        }
    }
    first.into_result()
}

fn check_cell<G: BlockGrid + ?Sized>(
    owner: ControllerId,
    kind_id: KindId,
    kind: &KindDef,
    bounds: &BoundingBox,
    parts: &PartArena,
    grid: &G,
    pos: BlockPos,
) -> Result<(), ValidationError> {
    if !grid.is_loaded(pos) {
        return Err(ValidationError::at(pos, ValidationReason::Unloaded));
    }
    let Some(position) = kind.geometry.classify(pos, bounds) else {
        return Ok(());
    };
    let hollow = position == PartPosition::Interior && kind.geometry.requires_hollow_interior();

    let own_kind_part = parts.at(pos).filter(|(_, part)| part.kind() == kind_id);
    match own_kind_part {
        Some((_, part)) => {
            if part.controller() != Some(owner) {
                return Err(ValidationError::at(pos, ValidationReason::ForeignPart));
            }
            if hollow {
                return Err(ValidationError::at(pos, ValidationReason::NotHollow));
            }
            if !part.is_good_for_position(position) {
                return Err(ValidationError::at(pos, ValidationReason::part_rejected(position)));
            }
        }
        None => {
            let block = grid.block_at(pos);
            if hollow {
                if block.is_some() {
                    return Err(ValidationError::at(pos, ValidationReason::NotHollow));
                }
            } else if !kind.blocks.accepts(position, block) {
                return Err(ValidationError::at(pos, ValidationReason::block_rejected(position)));
            }
        }
    }
    Ok(())
}
