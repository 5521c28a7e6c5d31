use crate::id::PartId;
use crate::position::BlockPos;
use std::collections::BTreeMap;

/// Position-indexed scratch set of parts (orphans, detached parts).
///
/// Never mutated while iterated: the reconciliation cycle swaps a fresh empty
/// storage in with [`take`](PartStorage::take) and walks the old one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartStorage {
    entries: BTreeMap<BlockPos, PartId>,
}

impl PartStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a part, replacing whatever was stored at the same position.
    /// Returns the replaced entry.
    pub fn add_or_replace(&mut self, position: BlockPos, part: PartId) -> Option<PartId> {
        self.entries.insert(position, part)
    }

    /// Remove `part` if it is the entry stored at `position`.
    pub fn remove(&mut self, position: BlockPos, part: PartId) -> bool {
        if self.entries.get(&position) == Some(&part) {
            self.entries.remove(&position);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, position: BlockPos, part: PartId) -> bool {
        self.entries.get(&position) == Some(&part)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockPos, PartId)> + '_ {
        self.entries.iter().map(|(&pos, &id)| (pos, id))
    }

    /// Snapshot the contents and leave an empty storage behind.
    pub fn take(&mut self) -> PartStorage {
        std::mem::take(self)
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(BlockPos, PartId) -> bool,
    {
        self.entries.retain(|&pos, &mut id| keep(pos, id));
    }

    /// Move every entry of `other` into this storage.
    pub fn absorb(&mut self, other: PartStorage) {
        self.entries.extend(other.entries);
    }
}
