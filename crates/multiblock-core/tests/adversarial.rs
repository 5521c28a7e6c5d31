//! Adversarial input tests for multiblock reconciliation.
//!
//! Edge cases that should either return errors or be handled gracefully
//! without panics.

use multiblock_core::event::StructureEvent;
use multiblock_core::geometry::Placement;
use multiblock_core::grid::MemoryGrid;
use multiblock_core::id::*;
use multiblock_core::position::{BlockPos, BoundingBox, Direction};
use multiblock_core::registry::RegistryError;
use multiblock_core::test_utils::*;
use multiblock_core::validation::ValidationReason;

/// Structures spanning unloaded cells stay disassembled instead of panicking.
#[test]
fn unloaded_cells_fail_validation() {
    let mut world = test_world();
    let mut grid = MemoryGrid::new();
    let bounds = BoundingBox::from_corners(BlockPos::new(0, 0, 0), BlockPos::new(2, 2, 2));
    grid.unload(BlockPos::new(1, 1, 1));
    place_surface(&mut world, reactor(), &bounds);

    settle(&mut world, &grid, 5);
    let controller = world.controller_at(BlockPos::new(0, 0, 0)).unwrap();
    assert!(!controller.is_assembled());
    assert_eq!(controller.last_error().unwrap().reason, ValidationReason::Unloaded);

    grid.load(BlockPos::new(1, 1, 1));
    world.notify_block_changed(BlockPos::new(1, 1, 1));
    let events = world.reconcile(&grid);
    assert!(matches!(events.as_slice(), [StructureEvent::Assembled { .. }]));
}

/// Parts at extreme coordinates classify and connect normally.
#[test]
fn extreme_coordinates() {
    let mut world = test_world();
    let grid = MemoryGrid::new();
    let far = BlockPos::new(i32::MAX - 2, i32::MIN, i32::MAX - 1);
    place_line(&mut world, pipe(), far, Direction::East, 2);

    settle(&mut world, &grid, 5);
    assert_eq!(world.controller_count(), 1);
    assert!(world.controller_at(far).unwrap().is_assembled());
}

/// Cells at opposite ends of the i32 range are not neighbors.
#[test]
fn opposite_grid_edges_never_connect() {
    let mut world = test_world();
    let grid = MemoryGrid::new();
    let east_edge = BlockPos::new(i32::MAX, 0, 0);
    let west_edge = BlockPos::new(i32::MIN, 0, 0);
    world.add_part(east_edge, pipe(), Placement::ANYWHERE).unwrap();
    world.add_part(west_edge, pipe(), Placement::ANYWHERE).unwrap();

    settle(&mut world, &grid, 5);
    assert_eq!(world.controller_count(), 2);
    let east = world.controller_at(east_edge).unwrap();
    let west = world.controller_at(west_edge).unwrap();
    assert_ne!(east.id(), west.id());
    assert_eq!(east.bounding_box(), Some(BoundingBox::from_corners(east_edge, east_edge)));
    assert!(east.is_assembled());
    assert!(west.is_assembled());

    // A chain ending on the edge splits cleanly without wrapping.
    let ids = place_line(&mut world, pipe(), BlockPos::new(i32::MAX - 3, 5, 0), Direction::East, 4);
    settle(&mut world, &grid, 5);
    world.remove_part(ids[2]).unwrap();
    settle(&mut world, &grid, 5);
    assert_eq!(world.controller_count(), 4);
    assert_eq!(world.controller_at(BlockPos::new(i32::MAX, 5, 0)).unwrap().parts_count(), 1);
}

/// Removing and re-adding the same cell repeatedly between cycles.
#[test]
fn churn_on_one_cell() {
    let mut world = test_world();
    let grid = MemoryGrid::new();
    place_line(&mut world, pipe(), BlockPos::new(0, 0, 0), Direction::East, 5);
    settle(&mut world, &grid, 5);

    let middle = BlockPos::new(2, 0, 0);
    for round in 0..10 {
        world.remove_part_at(middle).unwrap();
        if round % 2 == 0 {
            world.reconcile(&grid);
        }
        world.add_part(middle, pipe(), Placement::ANYWHERE).unwrap();
        world.reconcile(&grid);
    }
    settle(&mut world, &grid, 5);

    assert_eq!(world.controller_count(), 1);
    assert_eq!(world.controller_at(middle).unwrap().parts_count(), 5);
}

/// Invalidating every part of a structure empties and purges its controller.
#[test]
fn invalidate_everything() {
    let mut world = test_world();
    let grid = MemoryGrid::new();
    let ids = place_line(&mut world, pipe(), BlockPos::new(0, 0, 0), Direction::Up, 4);
    settle(&mut world, &grid, 5);

    for &id in &ids {
        assert!(world.invalidate_part(id));
    }
    let events = settle(&mut world, &grid, 5);
    assert!(events.iter().any(|e| matches!(e, StructureEvent::Destroyed { .. })));
    assert_eq!(world.controller_count(), 0);
    assert_eq!(world.orphan_count(), 0);
    assert!(world.is_idle());
}

/// Operations on ids that no longer exist are no-ops.
#[test]
fn stale_ids() {
    let mut world = test_world();
    let grid = MemoryGrid::new();
    let id = world.add_part(BlockPos::new(0, 0, 0), pipe(), Placement::ANYWHERE).unwrap();
    world.reconcile(&grid);
    world.remove_part(id).unwrap();

    assert!(world.remove_part(id).is_none());
    assert!(!world.invalidate_part(id));
    assert!(world.remove_part_at(BlockPos::new(7, 7, 7)).is_none());
    assert!(world.controller(ControllerId::default()).is_none());
    assert!(world.part_positions(ControllerId::default()).is_empty());
}

/// Unknown kinds are rejected up front.
#[test]
fn unknown_kind_rejected() {
    let mut world = test_world();
    let result = world.add_part(BlockPos::new(0, 0, 0), KindId(42), Placement::ANYWHERE);
    assert!(matches!(result, Err(RegistryError::UnknownKind(KindId(42)))));
    assert_eq!(world.part_count(), 0);
    assert!(world.is_idle());
}

/// A shell with a part inside its hollow reports the interior cell.
#[test]
fn filled_shell_is_not_hollow() {
    let mut world = test_world();
    let grid = MemoryGrid::new();
    let bounds = BoundingBox::from_corners(BlockPos::new(0, 0, 0), BlockPos::new(2, 2, 2));
    place_box(&mut world, tank(), &bounds);
    settle(&mut world, &grid, 5);

    let controller = world.controller_at(BlockPos::new(0, 0, 0)).unwrap();
    assert_eq!(controller.parts_count(), 27);
    let error = controller.last_error().unwrap();
    assert_eq!(error.reason, ValidationReason::NotHollow);
    assert_eq!(error.position, Some(BlockPos::new(1, 1, 1)));

    world.remove_part_at(BlockPos::new(1, 1, 1)).unwrap();
    settle(&mut world, &grid, 5);
    assert!(world.controller_at(BlockPos::new(0, 0, 0)).unwrap().is_assembled());
}

/// Placing over an existing part in a whole structure replaces it cleanly.
#[test]
fn overwrite_part_inside_structure() {
    let mut world = test_world();
    let grid = MemoryGrid::new();
    let bounds = BoundingBox::from_corners(BlockPos::new(0, 0, 0), BlockPos::new(2, 2, 2));
    place_surface(&mut world, tank(), &bounds);
    settle(&mut world, &grid, 5);
    assert!(world.controller_at(BlockPos::new(0, 0, 0)).unwrap().is_assembled());

    // Swap one face part for a pipe: the tank loses a cell.
    world.add_part(BlockPos::new(1, 2, 1), pipe(), Placement::ANYWHERE).unwrap();
    settle(&mut world, &grid, 5);
    let tank_controller = world.controller_at(BlockPos::new(0, 0, 0)).unwrap();
    assert_eq!(tank_controller.parts_count(), 25);
    assert!(!tank_controller.is_assembled());
    assert_eq!(world.controller_count(), 2);
}
