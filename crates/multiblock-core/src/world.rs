//! Per-world reconciliation.
//!
//! Host mutations (parts added, removed, invalidated, plain blocks changed)
//! only queue work. The queued work is folded into the controller set by a
//! reconciliation cycle that runs in five fixed phases:
//!
//! 1. **Orphans.** Each queued orphan probes its six neighbors for compatible
//!    controllers: none spawns a new controller, one attaches directly, two
//!    or more defer the orphan into a merge pool.
//! 2. **Merges.** Overlapping pools are unioned; each pool's master (chosen
//!    by the [`MergePolicy`](crate::config::MergePolicy)) assimilates the
//!    others, then adopts the deferred orphans. Orphans that still touch a
//!    foreign compatible controller form follow-up pools, consolidated in the
//!    same cycle.
//! 3. **Disconnections.** Every dirty controller drops invalid and
//!    unreachable parts, recomputes its bounding box and revalidates.
//! 4. **Purge.** Dead controllers leave the world.
//! 5. **Rehoming.** Parts detached this cycle become the next cycle's
//!    orphans.
//!
//! [`tick`](WorldRegistry::tick) gates cycles behind a countdown and skips
//! them entirely when there is no queued work.

use crate::catalog::Catalog;
use crate::config::ReconcileConfig;
use crate::controller::{AssemblyState, Controller};
use crate::event::StructureEvent;
use crate::geometry::Placement;
use crate::grid::BlockGrid;
use crate::id::{ControllerId, KindId, PartId, WorldId};
use crate::part::{Part, PartArena};
use crate::position::BlockPos;
use crate::registry::RegistryError;
use crate::storage::PartStorage;
use slotmap::SlotMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Controllers found touching each other, plus the orphans that revealed it.
#[derive(Debug, Default)]
struct MergePool {
    controllers: BTreeSet<ControllerId>,
    orphans: Vec<PartId>,
}

/// Reconciliation state for one world.
#[derive(Debug)]
pub struct WorldRegistry {
    world: WorldId,
    catalog: Arc<Catalog>,
    config: ReconcileConfig,
    parts: PartArena,
    controllers: SlotMap<ControllerId, Controller>,
    dirty_controllers: BTreeSet<ControllerId>,
    dead_controllers: BTreeSet<ControllerId>,
    orphaned_parts: PartStorage,
    detached_parts: PartStorage,
    countdown: u32,
    next_serial: u64,
    cycles: u64,
}

impl WorldRegistry {
    pub fn new(world: WorldId, catalog: Arc<Catalog>, config: ReconcileConfig) -> Self {
        Self {
            world,
            catalog,
            config,
            parts: PartArena::new(),
            controllers: SlotMap::with_key(),
            dirty_controllers: BTreeSet::new(),
            dead_controllers: BTreeSet::new(),
            orphaned_parts: PartStorage::new(),
            detached_parts: PartStorage::new(),
            countdown: config.interval.max(1),
            next_serial: 0,
            cycles: 0,
        }
    }

    pub fn world(&self) -> WorldId {
        self.world
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Number of reconciliation cycles run so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    // -----------------------------------------------------------------------
    // Host mutations
    // -----------------------------------------------------------------------

    /// Register a part at `pos`. It is queued as an orphan for the next
    /// cycle. A part already occupying the cell is removed first.
    pub fn add_part(
        &mut self,
        pos: BlockPos,
        kind: KindId,
        placement: Placement,
    ) -> Result<PartId, RegistryError> {
        if self.catalog.get_kind(kind).is_none() {
            return Err(RegistryError::UnknownKind(kind));
        }
        if let Some(existing) = self.parts.id_at(pos) {
            tracing::warn!(world = self.world.0, %pos, "part placed over an existing part; replacing it");
            self.remove_part(existing);
        }

        let id = self
            .parts
            .insert(Part::new(pos, kind, placement))
            .map_err(|_| RegistryError::CellOccupied(pos))?;
        self.orphaned_parts.add_or_replace(pos, id);
        self.notify_block_changed(pos);
        Ok(id)
    }

    /// Remove a part from the world, detaching it from its controller.
    pub fn remove_part(&mut self, id: PartId) -> Option<Part> {
        let pos = self.parts.position_of(id)?;
        if let Some(owner) = self.parts.get(id).and_then(Part::controller) {
            if let Some(controller) = self.controllers.get_mut(owner) {
                controller.detach_part(id, &mut self.parts);
                self.dirty_controllers.insert(owner);
            }
        }
        self.orphaned_parts.remove(pos, id);
        self.detached_parts.remove(pos, id);

        let part = self.parts.remove(id);
        self.notify_block_changed(pos);
        part
    }

    pub fn remove_part_at(&mut self, pos: BlockPos) -> Option<Part> {
        let id = self.parts.id_at(pos)?;
        self.remove_part(id)
    }

    /// Mark a part torn down. It is dropped from its controller on the next
    /// cycle and never re-homed.
    pub fn invalidate_part(&mut self, id: PartId) -> bool {
        let Some(part) = self.parts.get_mut(id) else {
            return false;
        };
        part.invalidate();
        let pos = part.position();
        match part.controller() {
            Some(owner) => self.mark_dirty(owner),
            None => {
                self.orphaned_parts.remove(pos, id);
            }
        }
        true
    }

    /// A plain block changed at `pos`. Every controller whose bounding box
    /// contains it is revalidated on the next cycle. Returns how many were.
    pub fn notify_block_changed(&mut self, pos: BlockPos) -> usize {
        let hits: Vec<ControllerId> = self
            .controllers
            .iter()
            .filter(|(_, c)| !c.is_dead() && c.bounding_box().is_some_and(|b| b.contains(pos)))
            .map(|(id, _)| id)
            .collect();
        for &id in &hits {
            self.mark_dirty(id);
        }
        hits.len()
    }

    fn mark_dirty(&mut self, id: ControllerId) {
        if let Some(controller) = self.controllers.get_mut(id) {
            controller.mark_dirty();
            self.dirty_controllers.insert(id);
        }
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// One simulation step. Runs a cycle every `interval` ticks, and only if
    /// there is queued work.
    pub fn tick<G: BlockGrid + ?Sized>(&mut self, grid: &G) -> Vec<StructureEvent> {
        if self.countdown > 1 {
            self.countdown -= 1;
            return Vec::new();
        }
        self.countdown = self.config.interval.max(1);
        if self.is_idle() {
            return Vec::new();
        }
        self.reconcile(grid)
    }

    /// All working sets are empty.
    pub fn is_idle(&self) -> bool {
        self.orphaned_parts.is_empty()
            && self.detached_parts.is_empty()
            && self.dirty_controllers.is_empty()
            && self.dead_controllers.is_empty()
    }

    /// Run one full reconciliation cycle now, ignoring the countdown.
    pub fn reconcile<G: BlockGrid + ?Sized>(&mut self, grid: &G) -> Vec<StructureEvent> {
        let span = tracing::info_span!("reconcile", world = self.world.0, cycle = self.cycles);
        let _guard = span.enter();
        self.cycles += 1;

        let mut events = Vec::new();
        let pools = self.phase_orphans(&mut events);
        self.phase_merge(pools, &mut events);
        self.phase_disconnections(grid, &mut events);
        self.phase_purge(&mut events);
        self.phase_rehome();

        tracing::trace!(
            controllers = self.controllers.len(),
            orphans = self.orphaned_parts.len(),
            events = events.len(),
            "cycle complete"
        );
        events
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    fn phase_orphans(&mut self, events: &mut Vec<StructureEvent>) -> Vec<MergePool> {
        let orphans = self.orphaned_parts.take();
        let mut pools = Vec::new();

        for (pos, part_id) in orphans.iter() {
            let Some(part) = self.parts.get(part_id) else {
                continue;
            };
            if part.is_invalid() || part.has_controller() || part.position() != pos {
                continue;
            }
            let kind = part.kind();
            let touching = self.touching_controllers(pos, kind);

            match touching.len() {
                0 => {
                    self.create_controller(kind, part_id, events);
                }
                1 => {
                    if let Some(&owner) = touching.first() {
                        self.attach_to(owner, part_id);
                    }
                }
                _ => pools.push(MergePool {
                    controllers: touching,
                    orphans: vec![part_id],
                }),
            }
        }
        pools
    }

    fn phase_merge(&mut self, pools: Vec<MergePool>, events: &mut Vec<StructureEvent>) {
        let mut absorbed_into: BTreeMap<ControllerId, ControllerId> = BTreeMap::new();
        let mut pending = union_pools(pools);

        while !pending.is_empty() {
            let mut follow_ups = Vec::new();

            for pool in pending {
                let members: BTreeSet<ControllerId> = pool
                    .controllers
                    .iter()
                    .map(|&id| resolve(&absorbed_into, id))
                    .filter(|&id| self.controllers.get(id).is_some_and(|c| !c.is_dead()))
                    .collect();

                let Some(master) = self.select_master(&members) else {
                    // Every member vanished; the orphans try again next cycle.
                    for orphan in pool.orphans {
                        if let Some(pos) = self.parts.position_of(orphan) {
                            self.detached_parts.add_or_replace(pos, orphan);
                        }
                    }
                    continue;
                };

                for &other in members.iter().filter(|&&id| id != master) {
                    if self.consume(master, other, events) {
                        absorbed_into.insert(other, master);
                    }
                }

                for orphan in pool.orphans {
                    if !self.attach_to(master, orphan) {
                        continue;
                    }
                    let Some(part) = self.parts.get(orphan) else {
                        continue;
                    };
                    let mut touching = self.touching_controllers(part.position(), part.kind());
                    touching.remove(&master);
                    if !touching.is_empty() {
                        touching.insert(master);
                        follow_ups.push(MergePool {
                            controllers: touching,
                            orphans: Vec::new(),
                        });
                    }
                }
            }

            for pool in &mut follow_ups {
                pool.controllers = pool
                    .controllers
                    .iter()
                    .map(|&id| resolve(&absorbed_into, id))
                    .collect();
            }
            pending = union_pools(follow_ups)
                .into_iter()
                .filter(|pool| pool.controllers.len() > 1)
                .collect();
        }
    }

    fn phase_disconnections<G: BlockGrid + ?Sized>(
        &mut self,
        grid: &G,
        events: &mut Vec<StructureEvent>,
    ) {
        let dirty = std::mem::take(&mut self.dirty_controllers);

        for id in dirty {
            let Some(controller) = self.controllers.get_mut(id) else {
                continue;
            };
            if controller.is_dead() {
                continue;
            }
            if controller.is_empty() {
                controller.mark_dead();
                self.dead_controllers.insert(id);
                continue;
            }

            let detached = controller.check_for_disconnections(&mut self.parts);
            if !detached.is_empty() {
                for &part_id in &detached {
                    if let Some(pos) = self.parts.position_of(part_id) {
                        self.detached_parts.add_or_replace(pos, part_id);
                    }
                }
                tracing::debug!(controller = ?id, detached = detached.len(), "controller split");
                events.push(StructureEvent::Split {
                    controller: id,
                    detached,
                });
            }
            if controller.is_empty() {
                controller.mark_dead();
                self.dead_controllers.insert(id);
                continue;
            }

            controller.recalculate_bounding_box(&self.parts);
            let Some(kind) = self.catalog.get_kind(controller.kind()) else {
                tracing::warn!(controller = ?id, kind = ?controller.kind(), "controller kind missing from catalog");
                continue;
            };
            match controller.revalidate(kind, &mut self.parts, grid) {
                Some(AssemblyState::Assembled) => {
                    tracing::debug!(controller = ?id, parts = controller.parts_count(), "structure assembled");
                    events.push(StructureEvent::Assembled { controller: id });
                }
                Some(AssemblyState::Disassembled) => {
                    let reason = controller.last_error().cloned();
                    tracing::debug!(controller = ?id, reason = ?reason, "structure disassembled");
                    events.push(StructureEvent::Disassembled {
                        controller: id,
                        reason,
                    });
                }
                None => {}
            }
            controller.clear_dirty();
        }
    }

    fn phase_purge(&mut self, events: &mut Vec<StructureEvent>) {
        let dead = std::mem::take(&mut self.dead_controllers);

        for id in dead {
            let Some(mut controller) = self.controllers.remove(id) else {
                continue;
            };
            if !controller.is_empty() {
                tracing::warn!(
                    controller = ?id,
                    parts = controller.parts_count(),
                    "dead controller still owns parts; detaching them"
                );
                for part_id in controller.detach_all(&mut self.parts) {
                    if let Some(pos) = self.parts.position_of(part_id) {
                        self.detached_parts.add_or_replace(pos, part_id);
                    }
                }
            }
            self.dirty_controllers.remove(&id);
            tracing::debug!(controller = ?id, "controller destroyed");
            events.push(StructureEvent::Destroyed { controller: id });
        }
    }

    fn phase_rehome(&mut self) {
        let mut rehomed = self.detached_parts.take();
        // Invalid parts stay out; owned ones were already re-homed.
        rehomed.retain(|_, part_id| {
            self.parts
                .get(part_id)
                .is_some_and(|part| !part.is_invalid() && !part.has_controller())
        });
        self.orphaned_parts.absorb(rehomed);
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Live controllers owning a compatible part next to `pos`.
    fn touching_controllers(&self, pos: BlockPos, kind: KindId) -> BTreeSet<ControllerId> {
        pos.neighbors()
            .filter_map(|neighbor| self.parts.at(neighbor))
            .filter(|(_, part)| !part.is_invalid() && self.catalog.compatible(kind, part.kind()))
            .filter_map(|(_, part)| part.controller())
            .filter(|&id| self.controllers.get(id).is_some_and(|c| !c.is_dead()))
            .collect()
    }

    fn create_controller(
        &mut self,
        kind: KindId,
        founder: PartId,
        events: &mut Vec<StructureEvent>,
    ) -> ControllerId {
        let serial = self.next_serial;
        self.next_serial += 1;
        let id = self
            .controllers
            .insert_with_key(|id| Controller::new(id, kind, serial));
        self.attach_to(id, founder);
        self.dirty_controllers.insert(id);

        tracing::debug!(controller = ?id, kind = ?kind, "controller created");
        events.push(StructureEvent::Created {
            controller: id,
            kind,
        });
        id
    }

    fn attach_to(&mut self, owner: ControllerId, part: PartId) -> bool {
        let Some(controller) = self.controllers.get_mut(owner) else {
            return false;
        };
        let attached = controller.attach_part(part, &mut self.parts);
        if attached {
            self.dirty_controllers.insert(owner);
        }
        attached
    }

    fn select_master(&self, members: &BTreeSet<ControllerId>) -> Option<ControllerId> {
        let policy = self.config.merge_policy;
        let mut best: Option<(ControllerId, &Controller)> = None;
        for &id in members {
            let Some(candidate) = self.controllers.get(id) else {
                continue;
            };
            best = match best {
                Some((_, current)) if !policy.should_consume(candidate, current) => best,
                _ => Some((id, candidate)),
            };
        }
        best.map(|(id, _)| id)
    }

    /// Assimilate `other` into `master` and queue `other` for purging.
    fn consume(
        &mut self,
        master: ControllerId,
        other: ControllerId,
        events: &mut Vec<StructureEvent>,
    ) -> bool {
        let Some([winner, loser]) = self.controllers.get_disjoint_mut([master, other]) else {
            return false;
        };
        let moved = winner.assimilate(loser, &mut self.parts);
        self.dirty_controllers.insert(master);
        self.dirty_controllers.remove(&other);
        self.dead_controllers.insert(other);

        tracing::debug!(master = ?master, consumed = ?other, moved, "controllers merged");
        events.push(StructureEvent::Merged {
            master,
            consumed: other,
        });
        true
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn parts(&self) -> &PartArena {
        &self.parts
    }

    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.get(id)
    }

    pub fn part_at(&self, pos: BlockPos) -> Option<(PartId, &Part)> {
        self.parts.at(pos)
    }

    pub fn controller(&self, id: ControllerId) -> Option<&Controller> {
        self.controllers.get(id)
    }

    /// The controller owning the part at `pos`.
    pub fn controller_at(&self, pos: BlockPos) -> Option<&Controller> {
        let (_, part) = self.parts.at(pos)?;
        self.controllers.get(part.controller()?)
    }

    pub fn controllers(&self) -> impl Iterator<Item = (ControllerId, &Controller)> {
        self.controllers.iter()
    }

    pub fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    pub fn orphan_count(&self) -> usize {
        self.orphaned_parts.len()
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Sorted positions of every part owned by `id`.
    pub fn part_positions(&self, id: ControllerId) -> Vec<BlockPos> {
        let Some(controller) = self.controllers.get(id) else {
            return Vec::new();
        };
        let mut positions: Vec<BlockPos> = controller
            .parts()
            .filter_map(|part| self.parts.position_of(part))
            .collect();
        positions.sort();
        positions
    }

    /// Drop the world. Returns how many controllers still owned parts.
    pub fn teardown(self) -> usize {
        let mut non_empty = 0;
        for (id, controller) in &self.controllers {
            if !controller.is_empty() {
                tracing::warn!(
                    world = self.world.0,
                    controller = ?id,
                    parts = controller.parts_count(),
                    "dropping non-empty controller at unload"
                );
                non_empty += 1;
            }
        }
        non_empty
    }
}

fn resolve(absorbed_into: &BTreeMap<ControllerId, ControllerId>, mut id: ControllerId) -> ControllerId {
    while let Some(&next) = absorbed_into.get(&id) {
        id = next;
    }
    id
}

/// Union pools transitively whenever they share a controller.
fn union_pools(pools: Vec<MergePool>) -> Vec<MergePool> {
    let mut merged: Vec<MergePool> = Vec::new();
    for mut pool in pools {
        let mut i = 0;
        while i < merged.len() {
            if merged[i].controllers.is_disjoint(&pool.controllers) {
                i += 1;
            } else {
                let overlapping = merged.swap_remove(i);
                pool.controllers.extend(overlapping.controllers);
                pool.orphans.extend(overlapping.orphans);
            }
        }
        merged.push(pool);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MergePolicy;
    use crate::geometry::PartPosition;
    use crate::grid::MemoryGrid;
    use crate::position::{BoundingBox, Direction};
    use crate::test_utils::*;
    use crate::validation::ValidationReason;

    fn p(x: i32, y: i32, z: i32) -> BlockPos {
        BlockPos::new(x, y, z)
    }

    fn created(events: &[StructureEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, StructureEvent::Created { .. }))
            .count()
    }

    fn merges(events: &[StructureEvent]) -> Vec<(ControllerId, ControllerId)> {
        events
            .iter()
            .filter_map(|e| match e {
                StructureEvent::Merged { master, consumed } => Some((*master, *consumed)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn adjacent_orphans_share_one_controller() {
        let mut world = test_world();
        let grid = MemoryGrid::new();
        world.add_part(p(0, 0, 0), pipe(), Placement::ANYWHERE).unwrap();
        world.add_part(p(1, 0, 0), pipe(), Placement::ANYWHERE).unwrap();

        let events = world.reconcile(&grid);
        assert_eq!(created(&events), 1);
        assert_eq!(world.controller_count(), 1);
        let owner = world.controller_at(p(0, 0, 0)).unwrap().id();
        assert_eq!(world.controller_at(p(1, 0, 0)).unwrap().id(), owner);
        assert_eq!(world.orphan_count(), 0);
    }

    #[test]
    fn tick_honours_interval() {
        let mut world = world_with(ReconcileConfig::default().with_interval(3));
        let grid = MemoryGrid::new();
        world.add_part(p(0, 0, 0), pipe(), Placement::ANYWHERE).unwrap();

        assert!(world.tick(&grid).is_empty());
        assert!(world.tick(&grid).is_empty());
        assert_eq!(world.cycles(), 0);
        assert_eq!(world.controller_count(), 0);

        let events = world.tick(&grid);
        assert_eq!(world.cycles(), 1);
        assert_eq!(created(&events), 1);
    }

    #[test]
    fn idle_world_skips_cycles() {
        let mut world = test_world();
        let grid = MemoryGrid::new();
        for _ in 0..5 {
            assert!(world.tick(&grid).is_empty());
        }
        assert_eq!(world.cycles(), 0);
        assert!(world.is_idle());

        // A forced cycle still runs.
        world.reconcile(&grid);
        assert_eq!(world.cycles(), 1);
    }

    #[test]
    fn incompatible_kinds_never_share() {
        let mut world = test_world();
        let grid = MemoryGrid::new();
        world.add_part(p(0, 0, 0), pipe(), Placement::ANYWHERE).unwrap();
        world.add_part(p(1, 0, 0), reactor(), Placement::ANYWHERE).unwrap();
        world.add_part(p(2, 0, 0), pipe(), Placement::ANYWHERE).unwrap();

        let events = world.reconcile(&grid);
        assert!(merges(&events).is_empty());
        assert_eq!(world.controller_count(), 3);
        for (_, controller) in world.controllers() {
            assert_eq!(controller.parts_count(), 1);
        }
    }

    #[test]
    fn orphan_bridging_two_controllers_merges_them() {
        let mut world = test_world();
        let grid = MemoryGrid::new();
        place_line(&mut world, pipe(), p(0, 0, 0), Direction::East, 3);
        world.reconcile(&grid);
        place_line(&mut world, pipe(), p(4, 0, 0), Direction::East, 3);
        world.reconcile(&grid);
        assert_eq!(world.controller_count(), 2);
        let older = world.controller_at(p(0, 0, 0)).unwrap().id();
        let younger = world.controller_at(p(4, 0, 0)).unwrap().id();

        world.add_part(p(3, 0, 0), pipe(), Placement::ANYWHERE).unwrap();
        let events = world.reconcile(&grid);

        // Equal sizes: the older controller survives.
        assert_eq!(merges(&events), vec![(older, younger)]);
        assert!(events.contains(&StructureEvent::Destroyed { controller: younger }));
        assert_eq!(world.controller_count(), 1);
        assert_eq!(world.controller(older).unwrap().parts_count(), 7);
        assert!(world.controller(younger).is_none());
    }

    #[test]
    fn most_parts_master_wins_merge() {
        let mut world = test_world();
        let grid = MemoryGrid::new();
        world.add_part(p(0, 0, 0), pipe(), Placement::ANYWHERE).unwrap();
        world.reconcile(&grid);
        place_line(&mut world, pipe(), p(2, 0, 0), Direction::East, 3);
        world.reconcile(&grid);
        let big = world.controller_at(p(2, 0, 0)).unwrap().id();

        world.add_part(p(1, 0, 0), pipe(), Placement::ANYWHERE).unwrap();
        let events = world.reconcile(&grid);
        assert_eq!(merges(&events).len(), 1);
        assert_eq!(merges(&events)[0].0, big);
        assert_eq!(world.controller(big).unwrap().parts_count(), 5);
    }

    #[test]
    fn oldest_policy_overrides_size() {
        let mut world = world_with(ReconcileConfig::every_tick().with_merge_policy(MergePolicy::Oldest));
        let grid = MemoryGrid::new();
        world.add_part(p(0, 0, 0), pipe(), Placement::ANYWHERE).unwrap();
        world.reconcile(&grid);
        let small = world.controller_at(p(0, 0, 0)).unwrap().id();
        place_line(&mut world, pipe(), p(2, 0, 0), Direction::East, 3);
        world.reconcile(&grid);

        world.add_part(p(1, 0, 0), pipe(), Placement::ANYWHERE).unwrap();
        world.reconcile(&grid);
        assert_eq!(world.controller_count(), 1);
        assert_eq!(world.controller(small).unwrap().parts_count(), 5);
    }

    #[test]
    fn follow_up_pools_merge_in_the_same_cycle() {
        let mut world = test_world();
        let grid = MemoryGrid::new();
        place_line(&mut world, pipe(), p(0, 0, 0), Direction::East, 2);
        world.reconcile(&grid);
        place_line(&mut world, pipe(), p(3, 0, 0), Direction::East, 2);
        world.reconcile(&grid);

        // (2,0,0) touches both lines; (2,0,1) only touches (2,0,0), which is
        // still unowned when it is probed, so it founds its own controller.
        world.add_part(p(2, 0, 0), pipe(), Placement::ANYWHERE).unwrap();
        world.add_part(p(2, 0, 1), pipe(), Placement::ANYWHERE).unwrap();
        let events = world.reconcile(&grid);

        assert_eq!(created(&events), 1);
        assert_eq!(merges(&events).len(), 2);
        assert_eq!(world.controller_count(), 1);
        let (_, survivor) = world.controllers().next().unwrap();
        assert_eq!(survivor.parts_count(), 6);
    }

    #[test]
    fn removing_bridge_splits_chain() {
        let mut world = test_world();
        let grid = MemoryGrid::new();
        place_line(&mut world, pipe(), p(0, 0, 0), Direction::East, 5);
        world.reconcile(&grid);
        let original = world.controller_at(p(0, 0, 0)).unwrap().id();

        world.remove_part_at(p(2, 0, 0)).unwrap();
        let events = world.reconcile(&grid);
        let split = events.iter().find_map(|e| match e {
            StructureEvent::Split { controller, detached } => Some((*controller, detached.len())),
            _ => None,
        });
        assert_eq!(split, Some((original, 2)));
        assert_eq!(world.part_positions(original), vec![p(0, 0, 0), p(1, 0, 0)]);
        assert_eq!(world.orphan_count(), 2);

        world.reconcile(&grid);
        assert_eq!(world.controller_count(), 2);
        let other = world.controller_at(p(3, 0, 0)).unwrap().id();
        assert_ne!(other, original);
        assert_eq!(world.part_positions(other), vec![p(3, 0, 0), p(4, 0, 0)]);
    }

    #[test]
    fn removing_last_part_destroys_controller() {
        let mut world = test_world();
        let grid = MemoryGrid::new();
        let id = world.add_part(p(0, 0, 0), pipe(), Placement::ANYWHERE).unwrap();
        world.reconcile(&grid);
        let controller = world.controller_at(p(0, 0, 0)).unwrap().id();

        assert!(world.remove_part(id).is_some());
        let events = world.reconcile(&grid);
        assert_eq!(events, vec![StructureEvent::Destroyed { controller }]);
        assert_eq!(world.controller_count(), 0);
        assert!(world.is_idle());
    }

    #[test]
    fn removing_unprocessed_orphan_leaves_no_trace() {
        let mut world = test_world();
        let grid = MemoryGrid::new();
        let id = world.add_part(p(0, 0, 0), pipe(), Placement::ANYWHERE).unwrap();
        world.remove_part(id);
        assert!(world.is_idle());
        assert!(world.reconcile(&grid).is_empty());
        assert_eq!(world.controller_count(), 0);
    }

    #[test]
    fn dead_controller_owning_parts_is_force_detached() {
        let mut world = test_world();
        let grid = MemoryGrid::new();
        place_line(&mut world, pipe(), p(0, 0, 0), Direction::East, 3);
        world.reconcile(&grid);
        let id = world.controller_at(p(0, 0, 0)).unwrap().id();

        world.controllers.get_mut(id).unwrap().mark_dead();
        world.dead_controllers.insert(id);
        let events = world.reconcile(&grid);

        assert!(events.contains(&StructureEvent::Destroyed { controller: id }));
        assert_eq!(world.controller_count(), 0);
        assert_eq!(world.orphan_count(), 3);
        assert!(world.parts().iter().all(|(_, part)| !part.has_controller()));

        world.reconcile(&grid);
        assert_eq!(world.controller_count(), 1);
    }

    #[test]
    fn invalidated_part_is_dropped_and_never_rehomed() {
        let mut world = test_world();
        let grid = MemoryGrid::new();
        let ids = place_line(&mut world, pipe(), p(0, 0, 0), Direction::East, 3);
        world.reconcile(&grid);

        assert!(world.invalidate_part(ids[2]));
        world.reconcile(&grid);
        assert_eq!(world.orphan_count(), 0);
        assert!(!world.part(ids[2]).unwrap().has_controller());
        assert_eq!(world.controller_at(p(0, 0, 0)).unwrap().parts_count(), 2);

        settle(&mut world, &grid, 4);
        assert!(!world.part(ids[2]).unwrap().has_controller());
    }

    #[test]
    fn invalidated_orphan_is_never_attached() {
        let mut world = test_world();
        let grid = MemoryGrid::new();
        let id = world.add_part(p(0, 0, 0), pipe(), Placement::ANYWHERE).unwrap();
        world.invalidate_part(id);
        world.reconcile(&grid);
        assert_eq!(world.controller_count(), 0);
        assert!(!world.invalidate_part(PartId::default()));
    }

    #[test]
    fn reactor_assembles_and_reacts_to_block_changes() {
        let mut world = test_world();
        let mut grid = MemoryGrid::new();
        let bounds = BoundingBox::from_corners(p(0, 0, 0), p(2, 2, 2));
        place_surface(&mut world, reactor(), &bounds);

        let events = world.reconcile(&grid);
        assert_eq!(world.controller_count(), 1);
        let id = world.controller_at(p(0, 0, 0)).unwrap().id();
        assert!(events.contains(&StructureEvent::Assembled { controller: id }));
        assert_eq!(
            world.part_at(p(0, 0, 0)).unwrap().1.part_position(),
            Some(PartPosition::Corner)
        );
        assert_eq!(
            world.part_at(p(1, 2, 1)).unwrap().1.part_position(),
            Some(PartPosition::Face(Direction::Up))
        );

        // Stone is not valid inside a reactor.
        grid.set_block(p(1, 1, 1), stone());
        assert_eq!(world.notify_block_changed(p(1, 1, 1)), 1);
        let events = world.reconcile(&grid);
        let reason = events.iter().find_map(|e| match e {
            StructureEvent::Disassembled { reason, .. } => reason.clone(),
            _ => None,
        });
        let reason = reason.unwrap();
        assert_eq!(reason.position, Some(p(1, 1, 1)));
        assert_eq!(reason.reason, ValidationReason::InvalidBlockForInterior);
        assert!(!world.controller(id).unwrap().is_assembled());

        grid.set_block(p(1, 1, 1), fuel_rod());
        world.notify_block_changed(p(1, 1, 1));
        let events = world.reconcile(&grid);
        assert_eq!(events, vec![StructureEvent::Assembled { controller: id }]);

        // Outside the box: nothing to revalidate.
        assert_eq!(world.notify_block_changed(p(9, 9, 9)), 0);
    }

    #[test]
    fn revalidation_without_change_emits_nothing() {
        let mut world = test_world();
        let grid = MemoryGrid::new();
        place_surface(&mut world, reactor(), &BoundingBox::from_corners(p(0, 0, 0), p(2, 2, 2)));
        world.reconcile(&grid);

        world.notify_block_changed(p(1, 1, 1));
        assert!(world.reconcile(&grid).is_empty());
    }

    #[test]
    fn add_part_replaces_existing_and_rejects_unknown_kind() {
        let mut world = test_world();
        let grid = MemoryGrid::new();
        let first = world.add_part(p(0, 0, 0), pipe(), Placement::ANYWHERE).unwrap();
        let second = world.add_part(p(0, 0, 0), pipe(), Placement::ANYWHERE).unwrap();
        assert!(world.part(first).is_none());
        assert_eq!(world.part_count(), 1);
        assert_eq!(world.part_at(p(0, 0, 0)).unwrap().0, second);

        let err = world.add_part(p(1, 0, 0), KindId(99), Placement::ANYWHERE).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownKind(KindId(99))));

        world.reconcile(&grid);
        assert_eq!(world.controller_count(), 1);
    }

    #[test]
    fn teardown_reports_non_empty_controllers() {
        let mut world = test_world();
        let grid = MemoryGrid::new();
        world.add_part(p(0, 0, 0), pipe(), Placement::ANYWHERE).unwrap();
        world.add_part(p(5, 0, 0), pipe(), Placement::ANYWHERE).unwrap();
        world.reconcile(&grid);
        assert_eq!(world.teardown(), 2);
    }

    #[test]
    fn union_pools_is_transitive() {
        let mut sm: SlotMap<ControllerId, ()> = SlotMap::with_key();
        let ids: Vec<ControllerId> = (0..5).map(|_| sm.insert(())).collect();
        let pool = |a: usize, b: usize| MergePool {
            controllers: [ids[a], ids[b]].into_iter().collect(),
            orphans: Vec::new(),
        };

        let merged = union_pools(vec![pool(0, 1), pool(2, 3), pool(1, 2)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].controllers.len(), 4);

        let separate = union_pools(vec![pool(0, 1), pool(3, 4)]);
        assert_eq!(separate.len(), 2);
    }
}
