use super::EnergyTerm;
use crate::core::change::Change;
use crate::core::space::Space;

/// Intramolecular bonded energy of molecular groups.
///
/// Evaluated for group entries flagged `internal` or `all`; single-atom
/// entries without the internal flag cannot change bond lengths and skip
/// this term entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntramolecularBonds;

/// Bonded energy of one group's current geometry, active or not. The
/// speciation move prices appearing and disappearing molecules with this,
/// which the Hamiltonian cannot do for inactive groups.
pub fn group_bond_energy(space: &Space, group_index: usize) -> f64 {
    let group = &space.groups[group_index];
    if group.atomic {
        return 0.0;
    }
    let kind = &space.topology.molecules[group.molecule];
    let mut sum = 0.0;
    for bond in &kind.bonds {
        let a = &space.particles[group.absolute(bond.index[0])];
        let b = &space.particles[group.absolute(bond.index[1])];
        let r = space.cell.vdist(&a.pos, &b.pos).norm();
        sum += bond.kind.energy(r);
    }
    sum
}

impl IntramolecularBonds {
    fn group_energy(&self, space: &Space, group_index: usize) -> f64 {
        if space.groups[group_index].is_empty() {
            return 0.0;
        }
        group_bond_energy(space, group_index)
    }
}

impl EnergyTerm for IntramolecularBonds {
    fn name(&self) -> &'static str {
        "bonded"
    }

    fn energy(&self, space: &Space, change: &Change) -> f64 {
        if change.is_empty() {
            return 0.0;
        }
        if change.everything || change.volume_changed {
            return (0..space.groups.len())
                .map(|index| self.group_energy(space, index))
                .sum();
        }
        change
            .groups
            .iter()
            .filter(|entry| entry.internal || entry.all)
            .map(|entry| self.group_energy(space, entry.group_index))
            .sum()
    }

    fn group_internal(&self, space: &Space, group_index: usize) -> f64 {
        self.group_energy(space, group_index)
    }

    fn box_clone(&self) -> Box<dyn EnergyTerm> {
        Box::new(*self)
    }
}
