use super::Analysis;
use crate::core::space::Space;
use crate::energy::Hamiltonian;
use crate::mc::SimulationError;
use crate::AVOGADRO;
use itertools::Itertools;

/// Mean active counts and molar concentrations per molecule kind.
pub struct SpeciesDensity {
    interval: u64,
    count_sums: Vec<f64>,
    volume_sum: f64,
    samples: u64,
}

impl SpeciesDensity {
    pub fn new(interval: u64, kinds: usize) -> Self {
        Self {
            interval,
            count_sums: vec![0.0; kinds],
            volume_sum: 0.0,
            samples: 0,
        }
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Mean active count of one molecule kind.
    pub fn mean_count(&self, molecule: usize) -> f64 {
        self.count_sums[molecule] / self.samples as f64
    }

    /// Mean concentration of one molecule kind in mol/l.
    pub fn mean_concentration(&self, molecule: usize) -> f64 {
        let mean_volume = self.volume_sum / self.samples as f64;
        // Å⁻³ -> mol/l
        self.mean_count(molecule) / mean_volume * 1e27 / AVOGADRO
    }
}

impl Analysis for SpeciesDensity {
    fn name(&self) -> &'static str {
        "density"
    }

    fn interval(&self) -> u64 {
        self.interval
    }

    fn sample(
        &mut self,
        space: &Space,
        _hamiltonian: &Hamiltonian,
        _step: u64,
    ) -> Result<(), SimulationError> {
        for molecule in 0..self.count_sums.len() {
            self.count_sums[molecule] += space.count_active(molecule) as f64;
        }
        self.volume_sum += space.cell.volume();
        self.samples += 1;
        Ok(())
    }

    fn report(&self) -> Option<String> {
        if self.samples == 0 {
            return None;
        }
        let body = (0..self.count_sums.len())
            .map(|molecule| {
                format!(
                    "kind {}: ⟨N⟩ = {:.2}, c = {:.4e} M",
                    molecule,
                    self.mean_count(molecule),
                    self.mean_concentration(molecule)
                )
            })
            .join("; ");
        Some(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::space::testutil::small_space;

    #[test]
    fn counts_follow_the_group_activity() {
        let hamiltonian = Hamiltonian::new();
        let mut space = small_space();
        let mut density = SpeciesDensity::new(1, 2);
        density.sample(&space, &hamiltonian, 0).unwrap();
        space.groups[0].deactivate(1);
        density.sample(&space, &hamiltonian, 1).unwrap();

        assert_eq!(density.samples(), 2);
        assert!((density.mean_count(0) - 2.5).abs() < 1e-12); // (3 + 2) / 2
        assert!((density.mean_count(1) - 2.0).abs() < 1e-12); // two trimers
    }

    #[test]
    fn concentration_uses_the_molar_conversion() {
        let hamiltonian = Hamiltonian::new();
        let space = small_space(); // cube of side 20 Å, 3 active ions
        let mut density = SpeciesDensity::new(1, 2);
        density.sample(&space, &hamiltonian, 0).unwrap();
        let expected = 3.0 / 8000.0 * 1e27 / AVOGADRO;
        assert!((density.mean_concentration(0) - expected).abs() < 1e-9);
    }
}
