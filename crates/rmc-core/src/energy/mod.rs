//! Energy terms and their ordered sum, the Hamiltonian.
//!
//! Every term consumes a [`Change`] and returns the energy of the touched
//! region only, in kT. The driver evaluates the same change on the accepted
//! and the trial space; the difference of the two restricted sums equals the
//! full energy difference, which is what makes incremental evaluation exact.

mod bonded;
mod containment;
mod nonbonded;

pub use bonded::{group_bond_energy, IntramolecularBonds};
pub use containment::CellContainment;
pub use nonbonded::{Coulomb, HardSphere, LennardJones, Nonbonded, PairPotential};

use crate::core::change::Change;
use crate::core::space::Space;

/// A single contribution to the system energy.
///
/// Implementations must satisfy: `energy(space, all)` restricted to any
/// partition of changes sums to the global value, and a term that depends on
/// nothing in `change` may return 0.
pub trait EnergyTerm: Send + Sync {
    fn name(&self) -> &'static str;

    /// Energy of the region described by `change`, in kT. A `change` with
    /// `everything` or `volume_changed` set must re-evaluate globally.
    fn energy(&self, space: &Space, change: &Change) -> f64;

    /// Self-energy of one group; used by grand-canonical and speciation
    /// corrections for groups the global sum cannot see while inactive.
    fn group_internal(&self, _space: &Space, _group_index: usize) -> f64 {
        0.0
    }

    /// Refresh internal caches after an accepted change (e.g. reciprocal
    /// space structure factors). Most terms are stateless and ignore this.
    fn update_state(&mut self, _space: &Space, _change: &Change) {}

    fn box_clone(&self) -> Box<dyn EnergyTerm>;
}

impl Clone for Box<dyn EnergyTerm> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Ordered list of energy terms whose sum is the configurational energy.
#[derive(Default, Clone)]
pub struct Hamiltonian {
    terms: Vec<Box<dyn EnergyTerm>>,
}

impl Hamiltonian {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, term: Box<dyn EnergyTerm>) {
        self.terms.push(term);
    }

    pub fn terms(&self) -> &[Box<dyn EnergyTerm>] {
        &self.terms
    }

    /// Sum of all terms over `change`. Infinity propagates: any term at +∞
    /// short-circuits the sum, and non-finite garbage (NaN from overflow) is
    /// mapped to +∞ so the move is rejected rather than silently accepted.
    pub fn energy(&self, space: &Space, change: &Change) -> f64 {
        let mut sum = 0.0;
        for term in &self.terms {
            let u = term.energy(space, change);
            if u.is_nan() || u == f64::INFINITY {
                return f64::INFINITY;
            }
            sum += u;
        }
        sum
    }

    /// Full system energy; shorthand for an `everything` change.
    pub fn total_energy(&self, space: &Space) -> f64 {
        let change = Change {
            everything: true,
            ..Default::default()
        };
        self.energy(space, &change)
    }

    /// Sum of the per-term self-energies of one group.
    pub fn group_internal(&self, space: &Space, group_index: usize) -> f64 {
        self.terms
            .iter()
            .map(|term| term.group_internal(space, group_index))
            .sum()
    }

    pub fn update_state(&mut self, space: &Space, change: &Change) {
        for term in &mut self.terms {
            term.update_state(space, change);
        }
    }
}

impl std::fmt::Debug for Hamiltonian {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.terms.iter().map(|t| t.name()))
            .finish()
    }
}

/// Absolute slots touched by a change, with their owning group index, in
/// ascending slot order. Shared helper for pair-sum restriction.
pub(crate) fn changed_slots(space: &Space, change: &Change) -> Vec<(usize, usize)> {
    let mut slots = Vec::new();
    for entry in &change.groups {
        let group = &space.groups[entry.group_index];
        if entry.all {
            slots.extend(group.active_range().map(|slot| (slot, entry.group_index)));
        } else {
            slots.extend(
                entry
                    .atoms
                    .iter()
                    .map(|&relative| group.absolute(relative))
                    .filter(|&slot| group.contains_active(slot))
                    .map(|slot| (slot, entry.group_index)),
            );
        }
    }
    slots
}
