use super::{changed_slots, EnergyTerm};
use crate::core::change::Change;
use crate::core::space::Space;

/// Returns +∞ if any touched active particle lies outside the cell, zero
/// otherwise. All moves wrap their output, so a hit here means a bug in a
/// move or an unwrapped input configuration; the Metropolis test turns it
/// into a clean rejection either way.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellContainment;

impl EnergyTerm for CellContainment {
    fn name(&self) -> &'static str {
        "containment"
    }

    fn energy(&self, space: &Space, change: &Change) -> f64 {
        if change.is_empty() {
            return 0.0;
        }
        let outside = if change.everything || change.volume_changed {
            space
                .active_slots()
                .iter()
                .any(|&slot| space.cell.collision(&space.particles[slot].pos))
        } else {
            changed_slots(space, change)
                .iter()
                .any(|&(slot, _)| space.cell.collision(&space.particles[slot].pos))
        };
        if outside {
            f64::INFINITY
        } else {
            0.0
        }
    }

    fn box_clone(&self) -> Box<dyn EnergyTerm> {
        Box::new(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::change::GroupChange;
    use crate::core::space::testutil::small_space;
    use crate::Point;

    #[test]
    fn wrapped_configuration_passes() {
        let space = small_space();
        let change = Change {
            everything: true,
            ..Default::default()
        };
        assert_eq!(CellContainment.energy(&space, &change), 0.0);
    }

    #[test]
    fn escaped_particle_is_infinitely_penalized() {
        let mut space = small_space();
        space.particles[0].pos = Point::new(11.0, 0.0, 0.0);
        let change = Change::single_group(GroupChange {
            group_index: 0,
            atoms: vec![0],
            ..Default::default()
        });
        assert_eq!(CellContainment.energy(&space, &change), f64::INFINITY);
    }

    #[test]
    fn untouched_escapee_is_not_this_changes_problem() {
        let mut space = small_space();
        space.particles[0].pos = Point::new(11.0, 0.0, 0.0);
        let change = Change::single_group(GroupChange {
            group_index: 0,
            atoms: vec![1],
            ..Default::default()
        });
        assert_eq!(CellContainment.energy(&space, &change), 0.0);
    }
}
