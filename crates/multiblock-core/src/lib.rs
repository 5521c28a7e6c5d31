//! Multiblock Core -- incremental assembly of multi-cell structures on a
//! partially loaded 3D block grid.
//!
//! Players place and break structure-aware blocks ("parts") one at a time.
//! This crate keeps, per world, a set of controllers (one per structure, whole
//! or not), each owning a connected group of compatible parts, and decides
//! when a structure satisfies its kind's shape and composition rules.
//!
//! # Five-Phase Reconciliation Cycle
//!
//! Host mutations only queue work. Each call to
//! [`world::WorldRegistry::reconcile`] (or an eligible
//! [`world::WorldRegistry::tick`]) folds that work in:
//!
//! 1. **Orphans** -- Unowned parts join a touching controller, found a new
//!    one, or are deferred into a merge pool when they touch several.
//! 2. **Merges** -- Touching controllers are consolidated into one master.
//! 3. **Disconnections** -- Dirty controllers drop unreachable parts,
//!    recompute bounds and revalidate.
//! 4. **Purge** -- Dead controllers are removed.
//! 5. **Rehoming** -- Detached parts become the next cycle's orphans.
//!
//! # Key Types
//!
//! - [`registry::MultiblockRegistry`] -- World handle to per-world registry
//!   dispatch with explicit load/unload.
//! - [`world::WorldRegistry`] -- Per-world reconciliation state machine.
//! - [`controller::Controller`] -- One structure: part index, bounding box,
//!   assembly state.
//! - [`geometry::Geometry`] -- Shape strategy (cuboid or hollow shell) with
//!   size limits and position classification.
//! - [`catalog::Catalog`] -- Immutable catalog of block types and structure
//!   kinds (frozen at startup).
//! - [`grid::BlockGrid`] -- Read access to the host's block storage.
//! - [`event::StructureEvent`] -- Lifecycle transitions returned by a cycle.

pub mod catalog;
pub mod config;
pub mod controller;
pub mod event;
pub mod geometry;
pub mod grid;
pub mod id;
pub mod part;
pub mod position;
pub mod registry;
pub mod storage;
pub mod validation;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
