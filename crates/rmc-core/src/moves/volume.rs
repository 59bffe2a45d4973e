use super::{Move, MoveContext, MoveStatistics};
use crate::core::change::Change;
use crate::core::geometry::VolumeScalePolicy;
use crate::mc::error::SimulationError;
use rand::Rng;

/// Isobaric volume move sampling uniformly in ln V.
///
/// The Jacobian of the ln V parametrization and the pressure work both enter
/// through `bias`; the Hamiltonian only sees the scaled configuration.
pub struct VolumeMove {
    /// Half-width of the ln V displacement.
    dv: f64,
    /// External pressure in kT/Å³.
    pressure: f64,
    policy: VolumeScalePolicy,
    weight: f64,
    statistics: MoveStatistics,
    old_volume: f64,
    new_volume: f64,
    /// Independent kinetic units (molecules plus free atoms) at proposal.
    units: usize,
}

impl VolumeMove {
    pub fn new(dv: f64, pressure: f64, policy: VolumeScalePolicy, weight: f64) -> Self {
        Self {
            dv,
            pressure,
            policy,
            weight,
            statistics: MoveStatistics::default(),
            old_volume: 0.0,
            new_volume: 0.0,
            units: 0,
        }
    }
}

impl Move for VolumeMove {
    fn name(&self) -> &str {
        "volume"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn propose(
        &mut self,
        context: &mut MoveContext,
        change: &mut Change,
    ) -> Result<(), SimulationError> {
        self.old_volume = context.trial.cell.volume();
        let ln_shift = self.dv * 2.0 * (context.rng.gen::<f64>() - 0.5);
        let target = self.old_volume * ln_shift.exp();
        self.units = context
            .trial
            .groups
            .iter()
            .map(|g| if g.atomic { g.len() } else { usize::from(!g.is_empty()) })
            .sum();

        context.trial.scale_volume(target, self.policy)?;
        // the realized volume, not the target: isochoric reshaping keeps V
        // fixed and must carry zero bias
        self.new_volume = context.trial.cell.volume();

        change.volume_changed = true;
        change.everything = true;
        Ok(())
    }

    fn bias(&self, _change: &Change, _uold: f64, _unew: f64) -> f64 {
        let n = self.units as f64;
        -(n + 1.0) * (self.new_volume / self.old_volume).ln()
            + self.pressure * (self.new_volume - self.old_volume)
    }

    fn accept(&mut self, _change: &Change) {
        self.statistics.record(true);
    }

    fn reject(&mut self, _change: &Change) {
        self.statistics.record(false);
    }

    fn statistics(&self) -> MoveStatistics {
        self.statistics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::space::testutil::small_space;
    use crate::moves::MoveRng;
    use rand::SeedableRng;

    #[test]
    fn proposal_flags_a_global_volume_change() {
        let accepted = small_space();
        let mut trial = accepted.clone();
        let mut peer = accepted.clone();
        let mut rng = MoveRng::seed_from_u64(5);
        let mut change = Change::default();

        let mut mv = VolumeMove::new(0.5, 0.0, VolumeScalePolicy::Isotropic, 1.0);
        let mut context = MoveContext {
            trial: &mut trial,
            peer: &mut peer,
            rng: &mut rng,
        };
        mv.propose(&mut context, &mut change).unwrap();

        assert!(change.volume_changed);
        assert!(change.everything);
        assert!((trial.cell.volume() - mv.new_volume).abs() < 1e-6);
        assert_ne!(trial.cell.volume(), accepted.cell.volume());
    }

    #[test]
    fn bias_contains_jacobian_and_pressure_work() {
        let mut mv = VolumeMove::new(0.5, 0.01, VolumeScalePolicy::Isotropic, 1.0);
        mv.old_volume = 1000.0;
        mv.new_volume = 1100.0;
        mv.units = 9;
        let expected = -10.0 * (1.1_f64).ln() + 0.01 * 100.0;
        assert!((mv.bias(&Change::default(), 0.0, 0.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn inverse_volume_move_restores_positions() {
        let accepted = small_space();
        let mut trial = accepted.clone();
        let v0 = trial.cell.volume();
        trial
            .scale_volume(1.3 * v0, VolumeScalePolicy::Isotropic)
            .unwrap();
        trial.scale_volume(v0, VolumeScalePolicy::Isotropic).unwrap();
        for (a, b) in trial.particles.iter().zip(&accepted.particles) {
            assert!((a.pos - b.pos).norm() < 1e-6);
        }
    }
}
