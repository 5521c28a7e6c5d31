//! Reconciliation tuning: cycle interval and merge master selection.

use crate::controller::Controller;
use serde::{Deserialize, Serialize};

/// Default number of ticks between reconciliation cycles.
pub const DEFAULT_INTERVAL: u32 = 20;

/// Per-world reconciliation settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Ticks between cycles. `0` and `1` both run a cycle on every tick.
    pub interval: u32,
    /// How the surviving controller of a merge is chosen.
    pub merge_policy: MergePolicy,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            merge_policy: MergePolicy::default(),
        }
    }
}

impl ReconcileConfig {
    /// Run a cycle on every tick.
    pub fn every_tick() -> Self {
        Self {
            interval: 1,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_merge_policy(mut self, merge_policy: MergePolicy) -> Self {
        self.merge_policy = merge_policy;
        self
    }
}

/// Chooses the master of a merge pool.
///
/// [`should_consume`](MergePolicy::should_consume) answers "should
/// `candidate` absorb `other`?"; the pool master is the controller that
/// should consume every other member.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Most parts wins; ties go to the oldest, then the lowest reference.
    #[default]
    MostParts,
    /// The earliest-created controller wins.
    Oldest,
    /// The controller whose smallest part position is lowest wins.
    LowestReference,
    /// Host-supplied comparator.
    #[serde(skip)]
    Custom(fn(&Controller, &Controller) -> bool),
}

impl MergePolicy {
    pub fn should_consume(&self, candidate: &Controller, other: &Controller) -> bool {
        match self {
            MergePolicy::MostParts => {
                let (a, b) = (candidate.parts_count(), other.parts_count());
                a > b || (a == b && older(candidate, other))
            }
            MergePolicy::Oldest => older(candidate, other),
            MergePolicy::LowestReference => match (candidate.reference(), other.reference()) {
                (Some(a), Some(b)) if a != b => a < b,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                _ => older(candidate, other),
            },
            MergePolicy::Custom(f) => f(candidate, other),
        }
    }
}

fn older(a: &Controller, b: &Controller) -> bool {
    a.serial() < b.serial()
}
