//! Reactor walkthrough: build a 5x5x5 reactor one part at a time, fill its
//! core, break a wall and watch the structure split and recover.
//!
//! Run with: `RUST_LOG=multiblock_core=debug cargo run -p multiblock-core --example reactor_walkthrough`

use multiblock_core::catalog::CatalogBuilder;
use multiblock_core::config::ReconcileConfig;
use multiblock_core::event::StructureEvent;
use multiblock_core::geometry::{AxisSizes, BlockFilter, BlockRules, Geometry, Placement};
use multiblock_core::grid::MemoryGrid;
use multiblock_core::id::WorldId;
use multiblock_core::position::{BlockPos, BoundingBox};
use multiblock_core::registry::MultiblockRegistry;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const OVERWORLD: WorldId = WorldId(0);

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // --- Catalog: one reactor kind with glass walls and fuel rods inside ---

    let mut builder = CatalogBuilder::new();
    let glass = builder.register_block("glass");
    let fuel_rod = builder.register_block("fuel_rod");
    let reactor = builder
        .register_kind(
            "reactor",
            Geometry::cuboid(AxisSizes::uniform(3), AxisSizes::uniform(7)),
            BlockRules {
                sides: BlockFilter::any_of([glass]),
                interior: BlockFilter::any_of([fuel_rod]).or_empty(),
                ..BlockRules::parts_only()
            },
        )
        .unwrap();
    let catalog = Arc::new(builder.build().unwrap());

    // Reconcile every 5 ticks.
    let mut registry = MultiblockRegistry::new(catalog, ReconcileConfig::default().with_interval(5));
    registry.load_world(OVERWORLD).unwrap();
    let mut grid = MemoryGrid::new();

    // --- Place the casing: every surface cell of a 5x5x5 box ---

    let bounds = BoundingBox::from_corners(BlockPos::new(0, 0, 0), BlockPos::new(4, 4, 4));
    let mut placed = 0;
    for pos in bounds.positions() {
        let on_surface = [pos.x, pos.y, pos.z].iter().any(|&c| c == 0 || c == 4);
        if on_surface {
            registry.add_part(OVERWORLD, pos, reactor, Placement::SURFACE).unwrap();
            placed += 1;
        }
    }
    println!("placed {placed} casing parts");
    run_ticks(&mut registry, &grid, 5);

    // --- Fill the core with fuel rods ---

    for pos in bounds.positions() {
        if [pos.x, pos.y, pos.z].iter().all(|&c| c > 0 && c < 4) {
            grid.set_block(pos, fuel_rod);
            registry.notify_block_changed(OVERWORLD, pos).unwrap();
        }
    }
    run_ticks(&mut registry, &grid, 5);

    // --- Break a whole wall column: the structure loses its shape ---

    for y in 0..5 {
        registry.remove_part_at(OVERWORLD, BlockPos::new(2, y, 0)).unwrap();
    }
    run_ticks(&mut registry, &grid, 10);

    // --- Rebuild it ---

    for y in 0..5 {
        registry
            .add_part(OVERWORLD, BlockPos::new(2, y, 0), reactor, Placement::SURFACE)
            .unwrap();
    }
    run_ticks(&mut registry, &grid, 10);

    let world = registry.world(OVERWORLD).unwrap();
    for (id, controller) in world.controllers() {
        println!(
            "controller {id:?}: {} parts, {:?}, bounds {:?}",
            controller.parts_count(),
            controller.assembly_state(),
            controller.bounding_box()
        );
    }
    registry.unload_world(OVERWORLD);
}

fn run_ticks(registry: &mut MultiblockRegistry, grid: &MemoryGrid, ticks: usize) {
    for _ in 0..ticks {
        for event in registry.tick_world(OVERWORLD, grid) {
            match event {
                StructureEvent::Disassembled { controller, reason } => {
                    let why = reason.map(|r| r.to_string()).unwrap_or_default();
                    println!("  {controller:?} disassembled: {why}");
                }
                other => println!("  {other:?}"),
            }
        }
    }
}
