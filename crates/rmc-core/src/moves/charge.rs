use super::{Move, MoveContext, MoveStatistics};
use crate::core::change::{Change, GroupChange};
use crate::mc::error::SimulationError;
use rand::Rng;

/// Displaces the charge of one fixed particle slot by a uniform amount.
///
/// A single-site titration workhorse; the slot is chosen at configuration
/// time, so the move pairs naturally with per-site acceptance statistics.
pub struct ChargeMove {
    slot: usize,
    name: String,
    dq: f64,
    weight: f64,
    statistics: MoveStatistics,
}

impl ChargeMove {
    pub fn new(slot: usize, dq: f64, weight: f64) -> Self {
        Self {
            slot,
            name: format!("charge/{}", slot),
            dq,
            weight,
            statistics: MoveStatistics::default(),
        }
    }
}

impl Move for ChargeMove {
    fn name(&self) -> &str {
        &self.name
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn propose(
        &mut self,
        context: &mut MoveContext,
        change: &mut Change,
    ) -> Result<(), SimulationError> {
        let group_index = context.trial.group_containing(self.slot).ok_or_else(|| {
            SimulationError::Internal(format!("charge move slot {} has no group", self.slot))
        })?;
        if !context.trial.groups[group_index].contains_active(self.slot) {
            return Ok(()); // slot currently inactive, nothing to do
        }
        let shift = self.dq * 2.0 * (context.rng.gen::<f64>() - 0.5);
        context.trial.particles[self.slot].charge += shift;

        let relative = context.trial.groups[group_index].relative(self.slot);
        *change = Change::single_group(GroupChange {
            group_index,
            internal: true,
            atoms: vec![relative],
            ..Default::default()
        });
        Ok(())
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
    fn charge_shift_touches_only_the_configured_slot() {
        let accepted = small_space();
        let mut trial = accepted.clone();
        let mut peer = accepted.clone();
        let mut rng = MoveRng::seed_from_u64(21);
        let mut change = Change::default();

        let mut mv = ChargeMove::new(2, 0.2, 1.0);
        let mut context = MoveContext {
            trial: &mut trial,
            peer: &mut peer,
            rng: &mut rng,
        };
        mv.propose(&mut context, &mut change).unwrap();

        assert_ne!(trial.particles[2].charge, accepted.particles[2].charge);
        assert_eq!(trial.particles[2].pos, accepted.particles[2].pos);
        assert_eq!(change.groups[0].atoms, vec![2]);
    }

    #[test]
    fn inactive_slot_yields_an_empty_change() {
        let accepted = small_space();
        let mut trial = accepted.clone();
        let mut peer = accepted.clone();
        let mut rng = MoveRng::seed_from_u64(22);
        let mut change = Change::default();

        let mut mv = ChargeMove::new(3, 0.2, 1.0); // inactive reservoir tail
        let mut context = MoveContext {
            trial: &mut trial,
            peer: &mut peer,
            rng: &mut rng,
        };
        mv.propose(&mut context, &mut change).unwrap();
        assert!(change.is_empty());
        assert_eq!(trial.particles[3].charge, accepted.particles[3].charge);
    }
}
