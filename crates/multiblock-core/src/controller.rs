//! Controllers: the aggregate that owns one (possibly unfinished) structure.
//!
//! A controller owns an index of part ids and a lazily recomputed bounding
//! box. It never owns the parts themselves; every operation that touches part
//! state takes the world's [`PartArena`].

use crate::catalog::KindDef;
use crate::geometry::PartPosition;
use crate::grid::BlockGrid;
use crate::id::{ControllerId, KindId, PartId};
use crate::part::PartArena;
use crate::position::{BlockPos, BoundingBox};
use crate::validation::{FirstError, ValidationError, ValidationReason, scan_structure};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Whether a controller's structure currently satisfies its kind's rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AssemblyState {
    #[default]
    Disassembled,
    Assembled,
}

/// One assembling or assembled structure.
#[derive(Debug, Clone)]
pub struct Controller {
    id: ControllerId,
    kind: KindId,
    /// Creation order within the world; lower is older.
    serial: u64,
    parts: BTreeSet<PartId>,
    bounds: Option<BoundingBox>,
    /// Smallest part position, maintained alongside `bounds`.
    reference: Option<BlockPos>,
    bounds_stale: bool,
    dirty: bool,
    dead: bool,
    state: AssemblyState,
    last_error: Option<ValidationError>,
}

impl Controller {
    pub(crate) fn new(id: ControllerId, kind: KindId, serial: u64) -> Self {
        Self {
            id,
            kind,
            serial,
            parts: BTreeSet::new(),
            bounds: None,
            reference: None,
            bounds_stale: false,
            dirty: true,
            dead: false,
            state: AssemblyState::Disassembled,
            last_error: None,
        }
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn kind(&self) -> KindId {
        self.kind
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn parts_count(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn parts(&self) -> impl Iterator<Item = PartId> + '_ {
        self.parts.iter().copied()
    }

    pub fn contains(&self, part: PartId) -> bool {
        self.parts.contains(&part)
    }

    /// Bounding box as of the last recalculation.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bounds
    }

    /// Smallest part position as of the last recalculation.
    pub fn reference(&self) -> Option<BlockPos> {
        self.reference
    }

    pub fn needs_bounds(&self) -> bool {
        self.bounds_stale
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn assembly_state(&self) -> AssemblyState {
        self.state
    }

    pub fn is_assembled(&self) -> bool {
        self.state == AssemblyState::Assembled
    }

    /// Why the last validation pass failed, if it did.
    pub fn last_error(&self) -> Option<&ValidationError> {
        self.last_error.as_ref()
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn mark_dead(&mut self) {
        self.dead = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Attach an unowned part. Returns `false` if the part is missing or
    /// already owned by any controller.
    pub fn attach_part(&mut self, part_id: PartId, parts: &mut PartArena) -> bool {
        let Some(part) = parts.get_mut(part_id) else {
            return false;
        };
        if let Some(owner) = part.controller() {
            if owner != self.id {
                tracing::warn!(
                    part = ?part_id,
                    owner = ?owner,
                    controller = ?self.id,
                    "refusing to attach a part owned by another controller"
                );
            }
            return false;
        }

        part.attach(self.id);
        let pos = part.position();
        self.parts.insert(part_id);
        if !self.bounds_stale {
            match &mut self.bounds {
                Some(bounds) => bounds.include(pos),
                None => self.bounds = Some(BoundingBox::from_point(pos)),
            }
            self.reference = Some(self.reference.map_or(pos, |r| r.min(pos)));
        }
        self.dirty = true;
        true
    }

    /// Detach one part. The bounding box goes stale until recalculated.
    pub fn detach_part(&mut self, part_id: PartId, parts: &mut PartArena) -> bool {
        if !self.parts.remove(&part_id) {
            return false;
        }
        if let Some(part) = parts.get_mut(part_id) {
            if part.controller() == Some(self.id) {
                part.detach();
            }
        }
        self.bounds_stale = true;
        self.dirty = true;
        true
    }

    /// Move every part of `other` into this controller. `other` is left
    /// empty and flagged dead. Returns the number of parts moved.
    pub fn assimilate(&mut self, other: &mut Controller, parts: &mut PartArena) -> usize {
        let moved = std::mem::take(&mut other.parts);
        for &part_id in &moved {
            if let Some(part) = parts.get_mut(part_id) {
                part.attach(self.id);
            }
        }
        let count = moved.len();
        self.parts.extend(moved);

        match (self.bounds_stale || other.bounds_stale, other.bounds) {
            (false, Some(theirs)) => {
                match &mut self.bounds {
                    Some(bounds) => bounds.union(&theirs),
                    None => self.bounds = Some(theirs),
                }
                self.reference = match (self.reference, other.reference) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
            }
            (false, None) => {}
            (true, _) => self.bounds_stale = true,
        }

        other.bounds = None;
        other.reference = None;
        other.bounds_stale = false;
        other.dirty = false;
        other.dead = true;
        self.dirty = true;
        count
    }

    /// Detach every part and return their ids.
    pub fn detach_all(&mut self, parts: &mut PartArena) -> Vec<PartId> {
        let detached: Vec<PartId> = std::mem::take(&mut self.parts).into_iter().collect();
        for &part_id in &detached {
            if let Some(part) = parts.get_mut(part_id) {
                if part.controller() == Some(self.id) {
                    part.detach();
                }
            }
        }
        self.bounds = None;
        self.reference = None;
        self.bounds_stale = false;
        self.dirty = true;
        detached
    }

    // -----------------------------------------------------------------------
    // Connectivity
    // -----------------------------------------------------------------------

    /// Drop invalid parts and every part no longer face-connected to the
    /// reference part (the one at the smallest position). Returns the
    /// detached parts that still exist in the arena.
    pub fn check_for_disconnections(&mut self, parts: &mut PartArena) -> Vec<PartId> {
        let mut detached = Vec::new();
        let mut forgotten = Vec::new();
        let mut by_position: BTreeMap<BlockPos, PartId> = BTreeMap::new();

        for &part_id in &self.parts {
            match parts.get(part_id) {
                Some(part) if part.is_invalid() || part.controller() != Some(self.id) => {
                    detached.push(part_id)
                }
                Some(part) => {
                    by_position.insert(part.position(), part_id);
                }
                None => forgotten.push(part_id),
            }
        }

        if let Some(&start) = by_position.keys().next() {
            let mut visited = BTreeSet::new();
            let mut queue = VecDeque::new();
            visited.insert(start);
            queue.push_back(start);

            while let Some(current) = queue.pop_front() {
                for neighbor in current.neighbors() {
                    if by_position.contains_key(&neighbor) && visited.insert(neighbor) {
                        queue.push_back(neighbor);
                    }
                }
            }

            detached.extend(
                by_position
                    .iter()
                    .filter(|(pos, _)| !visited.contains(*pos))
                    .map(|(_, &part_id)| part_id),
            );
        }

        if !forgotten.is_empty() {
            tracing::debug!(
                controller = ?self.id,
                count = forgotten.len(),
                "forgetting parts missing from the arena"
            );
        }
        for part_id in forgotten.iter().chain(detached.iter()) {
            self.parts.remove(part_id);
        }
        for &part_id in &detached {
            if let Some(part) = parts.get_mut(part_id) {
                if part.controller() == Some(self.id) {
                    part.detach();
                }
            }
        }
        if !detached.is_empty() || !forgotten.is_empty() {
            self.bounds_stale = true;
        }
        detached
    }

    /// Recompute the minimal box (and reference position) from scratch.
    pub fn recalculate_bounding_box(&mut self, parts: &PartArena) {
        let positions: Vec<BlockPos> = self
            .parts
            .iter()
            .filter_map(|&part_id| parts.position_of(part_id))
            .collect();
        self.bounds = BoundingBox::enclosing(positions.iter().copied());
        self.reference = positions.iter().copied().min();
        self.bounds_stale = false;
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Check size limits, then scan every cell of the bounding box.
    pub fn check_if_whole<G: BlockGrid + ?Sized>(
        &self,
        kind: &KindDef,
        parts: &PartArena,
        grid: &G,
    ) -> Result<(), ValidationError> {
        let bounds = if self.bounds_stale {
            BoundingBox::enclosing(self.parts.iter().filter_map(|&p| parts.position_of(p)))
        } else {
            self.bounds
        };

        let mut first = FirstError::new();
        match bounds {
            None => {
                first.record(ValidationError::general(ValidationReason::Empty));
            }
            Some(bounds) => {
                if let Err(error) = kind.geometry.validate_shape(&bounds, self.parts.len()) {
                    first.record(error);
                } else if let Err(error) = scan_structure(self.id, self.kind, kind, &bounds, parts, grid)
                {
                    first.record(error);
                }
            }
        }
        first.into_result()
    }

    /// Validate, refresh every part's cached position, and return the new
    /// assembly state if it changed.
    pub fn revalidate<G: BlockGrid + ?Sized>(
        &mut self,
        kind: &KindDef,
        parts: &mut PartArena,
        grid: &G,
    ) -> Option<AssemblyState> {
        if self.bounds_stale {
            self.recalculate_bounding_box(parts);
        }
        let result = self.check_if_whole(kind, parts, grid);

        if let Some(bounds) = self.bounds {
            for &part_id in &self.parts {
                if let Some(part) = parts.get_mut(part_id) {
                    let position = PartPosition::classify(part.position(), bounds.min, bounds.max);
                    part.set_part_position(position);
                }
            }
        }

        let next = match result {
            Ok(()) => AssemblyState::Assembled,
            Err(_) => AssemblyState::Disassembled,
        };
        self.last_error = result.err();
        if next != self.state {
            self.state = next;
            Some(next)
        } else {
            None
        }
    }
}
