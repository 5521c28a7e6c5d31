//! Parts: structure-aware grid cells, and the per-world arena that owns them.
//!
//! A part refers to its controller by id only. The controller owns the index
//! of part ids, so attaching and detaching are plain index updates.

use crate::geometry::{PartPosition, Placement};
use crate::id::{ControllerId, KindId, PartId};
use crate::position::BlockPos;
use slotmap::SlotMap;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Part
// ---------------------------------------------------------------------------

/// One structure-aware grid cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    position: BlockPos,
    kind: KindId,
    placement: Placement,
    controller: Option<ControllerId>,
    invalid: bool,
    /// Classification relative to the controller's bounding box, refreshed on
    /// every validation pass.
    part_position: Option<PartPosition>,
}

impl Part {
    pub fn new(position: BlockPos, kind: KindId, placement: Placement) -> Self {
        Self {
            position,
            kind,
            placement,
            controller: None,
            invalid: false,
            part_position: None,
        }
    }

    pub fn position(&self) -> BlockPos {
        self.position
    }

    /// The structure kind this part can join.
    pub fn kind(&self) -> KindId {
        self.kind
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn controller(&self) -> Option<ControllerId> {
        self.controller
    }

    pub fn has_controller(&self) -> bool {
        self.controller.is_some()
    }

    /// Torn down by the host (chunk unloaded, block being broken).
    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// Last known position within the structure, if attached and validated.
    pub fn part_position(&self) -> Option<PartPosition> {
        self.part_position
    }

    pub fn is_good_for_position(&self, position: PartPosition) -> bool {
        self.placement.accepts(position)
    }

    pub(crate) fn attach(&mut self, controller: ControllerId) {
        self.controller = Some(controller);
    }

    pub(crate) fn detach(&mut self) {
        self.controller = None;
        self.part_position = None;
    }

    pub(crate) fn invalidate(&mut self) {
        self.invalid = true;
    }

    pub(crate) fn set_part_position(&mut self, position: Option<PartPosition>) {
        self.part_position = position;
    }
}

// ---------------------------------------------------------------------------
// PartArena
// ---------------------------------------------------------------------------

/// Owns every part of one world, indexed by id and by position.
#[derive(Debug, Default)]
pub struct PartArena {
    parts: SlotMap<PartId, Part>,
    by_position: BTreeMap<BlockPos, PartId>,
}

impl PartArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a part. Fails (returning the part) if its cell is occupied.
    pub fn insert(&mut self, part: Part) -> Result<PartId, Part> {
        if self.by_position.contains_key(&part.position) {
            return Err(part);
        }
        let position = part.position;
        let id = self.parts.insert(part);
        self.by_position.insert(position, id);
        Ok(id)
    }

    pub fn remove(&mut self, id: PartId) -> Option<Part> {
        let part = self.parts.remove(id)?;
        if self.by_position.get(&part.position) == Some(&id) {
            self.by_position.remove(&part.position);
        }
        Some(part)
    }

    pub fn get(&self, id: PartId) -> Option<&Part> {
        self.parts.get(id)
    }

    pub fn get_mut(&mut self, id: PartId) -> Option<&mut Part> {
        self.parts.get_mut(id)
    }

    pub fn contains(&self, id: PartId) -> bool {
        self.parts.contains_key(id)
    }

    pub fn id_at(&self, pos: BlockPos) -> Option<PartId> {
        self.by_position.get(&pos).copied()
    }

    pub fn at(&self, pos: BlockPos) -> Option<(PartId, &Part)> {
        let id = self.id_at(pos)?;
        self.parts.get(id).map(|part| (id, part))
    }

    pub fn position_of(&self, id: PartId) -> Option<BlockPos> {
        self.parts.get(id).map(|part| part.position)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PartId, &Part)> {
        self.parts.iter()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}
