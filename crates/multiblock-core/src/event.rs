//! Structure lifecycle events.
//!
//! A reconciliation cycle returns the events it produced, in the order the
//! transitions happened. Events fire on transitions only: revalidating an
//! already assembled structure that is still whole emits nothing.

use crate::id::{ControllerId, KindId, PartId};
use crate::validation::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureEvent {
    /// A controller was spawned for an orphan with no compatible neighbor.
    Created { controller: ControllerId, kind: KindId },
    /// `consumed` was assimilated into `master` and is now dead.
    Merged {
        master: ControllerId,
        consumed: ControllerId,
    },
    /// Parts lost connection to (or were dropped from) `controller`.
    Split {
        controller: ControllerId,
        detached: Vec<PartId>,
    },
    /// A controller was removed from the world.
    Destroyed { controller: ControllerId },
    /// A structure became whole.
    Assembled { controller: ControllerId },
    /// A whole structure stopped being whole.
    Disassembled {
        controller: ControllerId,
        reason: Option<ValidationError>,
    },
}

impl StructureEvent {
    /// The controller the event is about (the master, for merges).
    pub fn controller(&self) -> ControllerId {
        match self {
            StructureEvent::Created { controller, .. }
            | StructureEvent::Split { controller, .. }
            | StructureEvent::Destroyed { controller }
            | StructureEvent::Assembled { controller }
            | StructureEvent::Disassembled { controller, .. } => *controller,
            StructureEvent::Merged { master, .. } => *master,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn controller_accessor() {
        let mut sm: SlotMap<ControllerId, ()> = SlotMap::with_key();
        let a = sm.insert(());
        let b = sm.insert(());

        let merged = StructureEvent::Merged {
            master: a,
            consumed: b,
        };
        assert_eq!(merged.controller(), a);
        assert_eq!(StructureEvent::Destroyed { controller: b }.controller(), b);
        assert_eq!(
            StructureEvent::Disassembled {
                controller: a,
                reason: None
            }
            .controller(),
            a
        );
    }
}
