use super::Analysis;
use crate::core::geometry::VolumeScalePolicy;
use crate::core::space::Space;
use crate::energy::Hamiltonian;
use crate::mc::SimulationError;

/// Pressure from virtual volume perturbation.
///
/// Each sample scales a throwaway copy of the space by +ΔV, measures the
/// energy change, and accumulates `⟨exp(−ΔU)⟩`; the excess pressure is
/// `ln⟨exp(−ΔU)⟩ / ΔV` and the ideal part `N/V`, both in kT/Å³. The
/// perturbation never touches the live state.
pub struct VirtualVolume {
    interval: u64,
    delta_volume: f64,
    exp_sum: f64,
    density_sum: f64,
    samples: u64,
}

impl VirtualVolume {
    pub fn new(interval: u64, delta_volume: f64) -> Self {
        Self {
            interval,
            delta_volume,
            exp_sum: 0.0,
            density_sum: 0.0,
            samples: 0,
        }
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Excess pressure in kT/Å³.
    pub fn excess_pressure(&self) -> f64 {
        (self.exp_sum / self.samples as f64).ln() / self.delta_volume
    }

    /// Ideal + excess pressure in kT/Å³.
    pub fn total_pressure(&self) -> f64 {
        self.density_sum / self.samples as f64 + self.excess_pressure()
    }
}

impl Analysis for VirtualVolume {
    fn name(&self) -> &'static str {
        "virtualvolume"
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
        let u_old = hamiltonian.total_energy(space);
        let mut perturbed = space.clone();
        let volume = perturbed.cell.volume();
        perturbed.scale_volume(volume + self.delta_volume, VolumeScalePolicy::Isotropic)?;
        let u_new = hamiltonian.total_energy(&perturbed);
        let du = u_new - u_old;
        self.exp_sum += (-du).exp();
        self.density_sum += space.active_len() as f64 / volume;
        self.samples += 1;
        Ok(())
    }

    fn report(&self) -> Option<String> {
        if self.samples == 0 {
            return None;
        }
        Some(format!(
            "excess pressure {:.6e} kT/Å³, total pressure {:.6e} kT/Å³ over {} samples",
            self.excess_pressure(),
            self.total_pressure(),
            self.samples
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::space::testutil::small_space;

    #[test]
    fn ideal_gas_has_zero_excess_pressure() {
        // empty Hamiltonian: all interactions vanish
        let hamiltonian = Hamiltonian::new();
        let space = small_space();
        let mut analysis = VirtualVolume::new(1, 1.0);
        for step in 0..100 {
            analysis.sample(&space, &hamiltonian, step).unwrap();
        }
        assert!(analysis.excess_pressure().abs() < 1e-12);
        let expected_ideal = space.active_len() as f64 / space.cell.volume();
        assert!((analysis.total_pressure() - expected_ideal).abs() < 1e-12);
    }

    #[test]
    fn perturbation_leaves_the_space_untouched() {
        let hamiltonian = Hamiltonian::new();
        let space = small_space();
        let reference = space.clone();
        let mut analysis = VirtualVolume::new(1, 2.0);
        analysis.sample(&space, &hamiltonian, 0).unwrap();
        assert_eq!(space.particles, reference.particles);
        assert_eq!(space.cell, reference.cell);
    }
}
