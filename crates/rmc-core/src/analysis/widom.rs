use super::Analysis;
use crate::core::change::{Change, GroupChange};
use crate::core::space::{GroupSelection, Space};
use crate::energy::Hamiltonian;
use crate::mc::SimulationError;
use crate::moves::random_rotation;
use crate::Point;
use rand_chacha::ChaCha8Rng;
use std::f64::consts::PI;
use tracing::warn;

/// Widom test-particle insertion: excess chemical potential of a molecule
/// kind from ghost insertions, `µ_ex = −ln⟨exp(−ΔU)⟩` in kT.
///
/// Ghosts are realized by activating an inactive group of the kind inside a
/// throwaway copy of the space; a topology without spare capacity simply
/// yields no samples.
pub struct WidomInsertion {
    interval: u64,
    molecule: usize,
    insertions_per_sample: usize,
    rng: ChaCha8Rng,
    exp_sum: f64,
    samples: u64,
    starved: bool,
}

impl WidomInsertion {
    pub fn new(interval: u64, molecule: usize, insertions_per_sample: usize, rng: ChaCha8Rng) -> Self {
        Self {
            interval,
            molecule,
            insertions_per_sample,
            rng,
            exp_sum: 0.0,
            samples: 0,
            starved: false,
        }
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Excess chemical potential in kT.
    pub fn excess_chemical_potential(&self) -> f64 {
        -(self.exp_sum / self.samples as f64).ln()
    }
}

impl Analysis for WidomInsertion {
    fn name(&self) -> &'static str {
        "widom"
    }

    fn interval(&self) -> u64 {
        self.interval
    }

    fn sample(
        &mut self,
        space: &Space,
        hamiltonian: &Hamiltonian,
        _step: u64,
    ) -> Result<(), SimulationError> {
        // atomic kinds need headroom in their single reservoir group,
        // molecular kinds need a fully inactive group to animate
        let candidate = if space.topology.molecules[self.molecule].atomic {
            space
                .find_molecules(self.molecule, GroupSelection::All)
                .find(|&index| space.groups[index].len() < space.groups[index].capacity())
        } else {
            space
                .find_molecules(self.molecule, GroupSelection::Inactive)
                .next()
        };
        let Some(group_index) = candidate else {
            if !self.starved {
                warn!(
                    molecule = self.molecule,
                    "widom insertion found no inactive slot to use as ghost"
                );
                self.starved = true;
            }
            return Ok(());
        };

        for _ in 0..self.insertions_per_sample {
            let mut ghosted = space.clone();
            let group = &ghosted.groups[group_index];
            let capacity = group.capacity();
            let atomic = group.atomic;

            let mut change_entry = GroupChange {
                group_index,
                all: true,
                internal: true,
                ..Default::default()
            };
            if atomic {
                ghosted.groups[group_index].activate(1);
                let relative = ghosted.groups[group_index].len() - 1;
                let slot = ghosted.groups[group_index].absolute(relative);
                let mut pos = Point::zeros();
                ghosted.cell.random_pos(&mut pos, &mut self.rng);
                ghosted.particles[slot].pos = pos;
                change_entry.all = false;
                change_entry.dn_atomic = true;
                change_entry.atoms = vec![relative];
            } else {
                ghosted.groups[group_index].activate(capacity);
                let old_cm = ghosted.groups[group_index]
                    .mass_center
                    .expect("inactive molecular group keeps its template mass center");
                let mut cm = Point::zeros();
                ghosted.cell.random_pos(&mut cm, &mut self.rng);
                ghosted.translate_group(group_index, &(cm - old_cm));
                let quat = random_rotation(&mut self.rng, PI);
                ghosted.rotate_group(group_index, &quat);
            }

            let change = Change {
                matter_changed: true,
                groups: vec![change_entry],
                ..Default::default()
            };
            let du = hamiltonian.energy(&ghosted, &change);
            self.exp_sum += if du.is_finite() { (-du).exp() } else { 0.0 };
            self.samples += 1;
        }
        Ok(())
    }

    fn report(&self) -> Option<String> {
        if self.samples == 0 {
            return None;
        }
        Some(format!(
            "µ_ex = {:.4} kT over {} insertions",
            self.excess_chemical_potential(),
            self.samples
        ))
    }
}
