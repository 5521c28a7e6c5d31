//! Top-level dispatch from world handles to their [`WorldRegistry`].
//!
//! Worlds are created explicitly on load and discarded on unload. Host events
//! for a world that is not loaded are logged and ignored.

use crate::catalog::Catalog;
use crate::config::ReconcileConfig;
use crate::event::StructureEvent;
use crate::geometry::Placement;
use crate::grid::BlockGrid;
use crate::id::{KindId, PartId, WorldId};
use crate::part::Part;
use crate::position::BlockPos;
use crate::world::WorldRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("world {0:?} is not loaded")]
    UnknownWorld(WorldId),
    #[error("world {0:?} is already loaded")]
    WorldAlreadyLoaded(WorldId),
    #[error("unknown structure kind {0:?}")]
    UnknownKind(KindId),
    #[error("no part at {0}")]
    UnknownPart(BlockPos),
    #[error("cell {0} is already occupied")]
    CellOccupied(BlockPos),
}

/// Owns one [`WorldRegistry`] per loaded world, all sharing one catalog.
#[derive(Debug)]
pub struct MultiblockRegistry {
    catalog: Arc<Catalog>,
    config: ReconcileConfig,
    worlds: BTreeMap<WorldId, WorldRegistry>,
}

impl MultiblockRegistry {
    pub fn new(catalog: Arc<Catalog>, config: ReconcileConfig) -> Self {
        Self {
            catalog,
            config,
            worlds: BTreeMap::new(),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // World lifecycle
    // -----------------------------------------------------------------------

    pub fn load_world(&mut self, world: WorldId) -> Result<&mut WorldRegistry, RegistryError> {
        if self.worlds.contains_key(&world) {
            return Err(RegistryError::WorldAlreadyLoaded(world));
        }
        tracing::debug!(world = world.0, "world loaded");
        let registry = WorldRegistry::new(world, Arc::clone(&self.catalog), self.config);
        Ok(self.worlds.entry(world).or_insert(registry))
    }

    /// Discard a world's registry. Returns `false` if it was not loaded.
    pub fn unload_world(&mut self, world: WorldId) -> bool {
        match self.worlds.remove(&world) {
            Some(registry) => {
                let leftover = registry.teardown();
                tracing::debug!(world = world.0, leftover, "world unloaded");
                true
            }
            None => {
                tracing::warn!(world = world.0, "unload for a world that is not loaded");
                false
            }
        }
    }

    pub fn is_loaded(&self, world: WorldId) -> bool {
        self.worlds.contains_key(&world)
    }

    pub fn loaded_worlds(&self) -> impl Iterator<Item = WorldId> + '_ {
        self.worlds.keys().copied()
    }

    pub fn world(&self, world: WorldId) -> Option<&WorldRegistry> {
        self.worlds.get(&world)
    }

    pub fn world_mut(&mut self, world: WorldId) -> Option<&mut WorldRegistry> {
        self.worlds.get_mut(&world)
    }

    fn require(&mut self, world: WorldId) -> Result<&mut WorldRegistry, RegistryError> {
        self.worlds.get_mut(&world).ok_or_else(|| {
            tracing::warn!(world = world.0, "event for a world that is not loaded");
            RegistryError::UnknownWorld(world)
        })
    }

    // -----------------------------------------------------------------------
    // Host events
    // -----------------------------------------------------------------------

    /// Per-world tick callback. An unknown world is a logged no-op.
    pub fn tick_world<G: BlockGrid + ?Sized>(
        &mut self,
        world: WorldId,
        grid: &G,
    ) -> Vec<StructureEvent> {
        match self.require(world) {
            Ok(registry) => registry.tick(grid),
            Err(_) => Vec::new(),
        }
    }

    pub fn add_part(
        &mut self,
        world: WorldId,
        pos: BlockPos,
        kind: KindId,
        placement: Placement,
    ) -> Result<PartId, RegistryError> {
        self.require(world)?.add_part(pos, kind, placement)
    }

    pub fn remove_part_at(&mut self, world: WorldId, pos: BlockPos) -> Result<Part, RegistryError> {
        self.require(world)?
            .remove_part_at(pos)
            .ok_or(RegistryError::UnknownPart(pos))
    }

    pub fn invalidate_part_at(&mut self, world: WorldId, pos: BlockPos) -> Result<(), RegistryError> {
        let registry = self.require(world)?;
        let (id, _) = registry.part_at(pos).ok_or(RegistryError::UnknownPart(pos))?;
        registry.invalidate_part(id);
        Ok(())
    }

    pub fn notify_block_changed(&mut self, world: WorldId, pos: BlockPos) -> Result<usize, RegistryError> {
        Ok(self.require(world)?.notify_block_changed(pos))
    }
}
