//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::catalog::{Catalog, CatalogBuilder};
use crate::config::ReconcileConfig;
use crate::event::StructureEvent;
use crate::geometry::{AxisSizes, BlockFilter, BlockRules, Geometry, Placement};
use crate::grid::BlockGrid;
use crate::id::*;
use crate::position::{BlockPos, BoundingBox, Direction};
use crate::world::WorldRegistry;
use std::sync::Arc;

// ===========================================================================
// Block types
// ===========================================================================

pub fn casing() -> BlockTypeId {
    BlockTypeId(0)
}
pub fn glass() -> BlockTypeId {
    BlockTypeId(1)
}
pub fn fuel_rod() -> BlockTypeId {
    BlockTypeId(2)
}
pub fn stone() -> BlockTypeId {
    BlockTypeId(3)
}

// ===========================================================================
// Structure kinds
// ===========================================================================

/// 3..=7 cuboid. Glass is allowed on the faces, fuel rods (or air) inside.
pub fn reactor() -> KindId {
    KindId(0)
}

/// 3..=9 hollow shell made only of parts.
pub fn tank() -> KindId {
    KindId(1)
}

/// Any cuboid up to 64 per axis, parts only. Handy for chains.
pub fn pipe() -> KindId {
    KindId(2)
}

/// Catalog with the stock block types and kinds above, in id order.
pub fn stock_catalog() -> Arc<Catalog> {
    let mut b = CatalogBuilder::new();
    b.register_block("casing");
    let glass = b.register_block("glass");
    let fuel_rod = b.register_block("fuel_rod");
    b.register_block("stone");

    b.register_kind(
        "reactor",
        Geometry::cuboid(AxisSizes::uniform(3), AxisSizes::uniform(7)),
        BlockRules {
            top: BlockFilter::any_of([glass]),
            sides: BlockFilter::any_of([glass]),
            interior: BlockFilter::any_of([fuel_rod]).or_empty(),
            ..BlockRules::parts_only()
        },
    )
    .unwrap();
    b.register_kind(
        "tank",
        Geometry::shell(AxisSizes::uniform(3), AxisSizes::uniform(9)),
        BlockRules::parts_only(),
    )
    .unwrap();
    b.register_kind(
        "pipe",
        Geometry::cuboid(AxisSizes::uniform(1), AxisSizes::uniform(64)),
        BlockRules::parts_only(),
    )
    .unwrap();

    Arc::new(b.build().unwrap())
}

// ===========================================================================
// Worlds
// ===========================================================================

pub fn world_with(config: ReconcileConfig) -> WorldRegistry {
    WorldRegistry::new(WorldId(0), stock_catalog(), config)
}

/// World over the stock catalog that reconciles on every tick.
pub fn test_world() -> WorldRegistry {
    world_with(ReconcileConfig::every_tick())
}

// ===========================================================================
// Placement helpers
// ===========================================================================

/// Place `len` parts starting at `start`, stepping along `dir`.
pub fn place_line(
    world: &mut WorldRegistry,
    kind: KindId,
    start: BlockPos,
    dir: Direction,
    len: usize,
) -> Vec<PartId> {
    let mut pos = start;
    let mut ids = Vec::with_capacity(len);
    for i in 0..len {
        if i > 0 {
            pos = pos.offset(dir).unwrap();
        }
        ids.push(world.add_part(pos, kind, Placement::ANYWHERE).unwrap());
    }
    ids
}

/// Fill every cell of `bounds` with parts.
pub fn place_box(world: &mut WorldRegistry, kind: KindId, bounds: &BoundingBox) -> Vec<PartId> {
    bounds
        .positions()
        .map(|pos| world.add_part(pos, kind, Placement::ANYWHERE).unwrap())
        .collect()
}

/// Fill only the surface cells of `bounds` with parts.
pub fn place_surface(world: &mut WorldRegistry, kind: KindId, bounds: &BoundingBox) -> Vec<PartId> {
    bounds
        .positions()
        .filter(|&pos| is_surface(pos, bounds))
        .map(|pos| world.add_part(pos, kind, Placement::SURFACE).unwrap())
        .collect()
}

pub fn is_surface(pos: BlockPos, bounds: &BoundingBox) -> bool {
    pos.x == bounds.min.x
        || pos.x == bounds.max.x
        || pos.y == bounds.min.y
        || pos.y == bounds.max.y
        || pos.z == bounds.min.z
        || pos.z == bounds.max.z
}

/// Run forced cycles until the world is idle or `max_cycles` ran. Returns
/// every event produced.
pub fn settle<G: BlockGrid + ?Sized>(
    world: &mut WorldRegistry,
    grid: &G,
    max_cycles: usize,
) -> Vec<StructureEvent> {
    let mut events = Vec::new();
    for _ in 0..max_cycles {
        if world.is_idle() {
            break;
        }
        events.extend(world.reconcile(grid));
    }
    events
}
