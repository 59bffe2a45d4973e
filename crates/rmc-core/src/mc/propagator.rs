use crate::moves::{Move, MoveRng};
use rand::distributions::WeightedIndex;
use rand::prelude::*;

/// Weighted-random selector over the configured moves.
///
/// One sweep performs `repeats_per_sweep` draws from the categorical
/// distribution given by the move weights; a move with weight w is drawn w
/// times per sweep on average.
pub struct Propagator {
    moves: Vec<Box<dyn Move>>,
    distribution: WeightedIndex<f64>,
    repeats_per_sweep: usize,
}

impl Propagator {
    pub fn new(moves: Vec<Box<dyn Move>>) -> Result<Self, String> {
        if moves.is_empty() {
            return Err("no moves configured".into());
        }
        let weights: Vec<f64> = moves.iter().map(|m| m.weight()).collect();
        let distribution =
            WeightedIndex::new(&weights).map_err(|e| format!("bad move weights: {}", e))?;
        let repeats_per_sweep = weights.iter().sum::<f64>().round().max(1.0) as usize;
        Ok(Self {
            moves,
            distribution,
            repeats_per_sweep,
        })
    }

    /// Number of draws that make up one sweep.
    pub fn repeats_per_sweep(&self) -> usize {
        self.repeats_per_sweep
    }

    /// Draw the index of the next move to run.
    pub fn sample(&self, rng: &mut MoveRng) -> usize {
        self.distribution.sample(rng)
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Box<dyn Move> {
        &mut self.moves[index]
    }

    pub fn moves(&self) -> &[Box<dyn Move>] {
        &self.moves
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::change::Change;
    use crate::mc::error::SimulationError;
    use crate::moves::{MoveContext, MoveStatistics};
    use rand::SeedableRng;

    struct Inert {
        weight: f64,
    }

    impl Move for Inert {
        fn name(&self) -> &str {
            "inert"
        }
        fn weight(&self) -> f64 {
            self.weight
        }
        fn propose(
            &mut self,
            _context: &mut MoveContext,
            _change: &mut Change,
        ) -> Result<(), SimulationError> {
            Ok(())
        }
        fn accept(&mut self, _change: &Change) {}
        fn reject(&mut self, _change: &Change) {}
        fn statistics(&self) -> MoveStatistics {
            MoveStatistics::default()
        }
    }

    #[test]
    fn sweep_length_is_the_rounded_weight_sum() {
        let propagator = Propagator::new(vec![
            Box::new(Inert { weight: 3.0 }),
            Box::new(Inert { weight: 7.0 }),
        ])
        .unwrap();
        assert_eq!(propagator.repeats_per_sweep(), 10);
    }

    #[test]
    fn draws_follow_the_weights() {
        let propagator = Propagator::new(vec![
            Box::new(Inert { weight: 1.0 }),
            Box::new(Inert { weight: 3.0 }),
        ])
        .unwrap();
        let mut rng = MoveRng::seed_from_u64(8);
        let draws = 40_000;
        let hits = (0..draws).filter(|_| propagator.sample(&mut rng) == 1).count();
        let fraction = hits as f64 / draws as f64;
        assert!((fraction - 0.75).abs() < 0.01, "fraction {}", fraction);
    }

    #[test]
    fn empty_move_list_is_an_error() {
        assert!(Propagator::new(vec![]).is_err());
    }
}
