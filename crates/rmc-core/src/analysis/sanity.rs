use super::Analysis;
use crate::core::space::Space;
use crate::energy::{group_bond_energy, Hamiltonian};
use crate::mc::SimulationError;

/// Structural invariant checks on the accepted state. Any hit is fatal: it
/// indicates a bug in a move or in the sync machinery, not bad luck.
pub struct SanityCheck {
    interval: u64,
    mass_center_tolerance: f64,
}

impl SanityCheck {
    pub fn new(interval: u64) -> Self {
        Self {
            interval,
            mass_center_tolerance: 1e-6,
        }
    }

    pub fn run_once(&self, space: &Space, step: u64) -> Result<(), SimulationError> {
        // groups tile the particle array contiguously
        let mut cursor = 0;
        for group in &space.groups {
            if group.begin() != cursor {
                return Err(SimulationError::Internal(format!(
                    "group windows do not tile the particle array at slot {}",
                    cursor
                )));
            }
            cursor += group.capacity();
        }
        if cursor != space.particles.len() {
            return Err(SimulationError::Internal(format!(
                "group windows cover {} slots but {} particles exist",
                cursor,
                space.particles.len()
            )));
        }

        for (index, group) in space.groups.iter().enumerate() {
            for slot in group.active_range() {
                if space.cell.collision(&space.particles[slot].pos) {
                    return Err(SimulationError::ParticleOutsideCell {
                        particle: slot,
                        group: index,
                        step,
                    });
                }
            }
            if !group.atomic && !group.is_empty() {
                let stored = group.mass_center.ok_or_else(|| {
                    SimulationError::Internal(format!(
                        "active molecular group {} lacks a mass center",
                        index
                    ))
                })?;
                let fresh = space
                    .mass_center_of(index)
                    .expect("non-empty group has a mass center");
                if space.cell.sqdist(&stored, &fresh) > self.mass_center_tolerance {
                    return Err(SimulationError::MassCenterDrift {
                        group: index,
                        drift: space.cell.sqdist(&stored, &fresh).sqrt(),
                        step,
                    });
                }
                if !group_bond_energy(space, index).is_finite() {
                    return Err(SimulationError::NonFiniteBondEnergy { group: index, step });
                }
            }
        }

        for (index, &fill) in space.reservoirs.iter().enumerate() {
            if space.topology.reactions[index].canonic && fill < 0 {
                return Err(SimulationError::ReservoirUnderflow(
                    space.topology.reactions[index].name.clone(),
                ));
            }
        }
        Ok(())
    }
}

impl Analysis for SanityCheck {
    fn name(&self) -> &'static str {
        "sanity"
    }

    fn interval(&self) -> u64 {
        self.interval
    }

    fn sample(
        &mut self,
        space: &Space,
        _hamiltonian: &Hamiltonian,
        step: u64,
    ) -> Result<(), SimulationError> {
        self.run_once(space, step)
    }
}
