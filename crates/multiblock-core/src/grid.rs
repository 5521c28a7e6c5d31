//! Read access to the host's block storage.
//!
//! The reconciliation core never owns world storage. Validation reads cells
//! through [`BlockGrid`]; [`MemoryGrid`] is a sparse in-memory implementation
//! for headless hosts, tools and tests.

use crate::id::BlockTypeId;
use crate::position::{BlockPos, BoundingBox};
use std::collections::{BTreeMap, BTreeSet};

/// Host grid accessor.
///
/// Implementations must not panic for absent or unloaded cells: return
/// `None` / `false` instead.
pub trait BlockGrid {
    /// The block occupying `pos`, or `None` for an empty cell.
    fn block_at(&self, pos: BlockPos) -> Option<BlockTypeId>;

    /// Whether `pos` is currently loaded and safe to inspect.
    fn is_loaded(&self, pos: BlockPos) -> bool;
}

impl<G: BlockGrid + ?Sized> BlockGrid for &G {
    fn block_at(&self, pos: BlockPos) -> Option<BlockTypeId> {
        (**self).block_at(pos)
    }

    fn is_loaded(&self, pos: BlockPos) -> bool {
        (**self).is_loaded(pos)
    }
}

// ---------------------------------------------------------------------------
// MemoryGrid
// ---------------------------------------------------------------------------

/// A sparse block map. Every cell is loaded unless explicitly unloaded.
#[derive(Debug, Clone, Default)]
pub struct MemoryGrid {
    blocks: BTreeMap<BlockPos, BlockTypeId>,
    unloaded: BTreeSet<BlockPos>,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a block, returning the one it replaced.
    pub fn set_block(&mut self, pos: BlockPos, block: BlockTypeId) -> Option<BlockTypeId> {
        self.blocks.insert(pos, block)
    }

    /// Clear a cell, returning the block that was there.
    pub fn clear_block(&mut self, pos: BlockPos) -> Option<BlockTypeId> {
        self.blocks.remove(&pos)
    }

    /// Fill every cell of `bounds` with `block`.
    pub fn fill(&mut self, bounds: &BoundingBox, block: BlockTypeId) {
        for pos in bounds.positions() {
            self.blocks.insert(pos, block);
        }
    }

    pub fn unload(&mut self, pos: BlockPos) {
        self.unloaded.insert(pos);
    }

    pub fn load(&mut self, pos: BlockPos) {
        self.unloaded.remove(&pos);
    }

    /// Number of non-empty cells.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

impl BlockGrid for MemoryGrid {
    fn block_at(&self, pos: BlockPos) -> Option<BlockTypeId> {
        if self.unloaded.contains(&pos) {
            return None;
        }
        self.blocks.get(&pos).copied()
    }

    fn is_loaded(&self, pos: BlockPos) -> bool {
        !self.unloaded.contains(&pos)
    }
}
