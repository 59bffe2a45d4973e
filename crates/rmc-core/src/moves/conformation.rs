use super::{Move, MoveContext, MoveStatistics};
use crate::core::change::{Change, GroupChange};
use crate::core::space::GroupSelection;
use crate::mc::error::SimulationError;
use rand::distributions::WeightedIndex;
use rand::prelude::*;

/// Replaces one active molecular group with a conformation drawn from its
/// kind's weighted library.
///
/// The group's mass center is preserved; the template's own orientation is
/// kept, so no additional rotation is applied. The chosen conformation id is
/// stored on the group for reaction-coordinate analyses.
pub struct ConformationSwap {
    molecule: usize,
    name: String,
    distribution: WeightedIndex<f64>,
    weight: f64,
    statistics: MoveStatistics,
}

impl ConformationSwap {
    pub fn new(
        molecule: usize,
        molecule_name: &str,
        conformation_weights: &[f64],
        weight: f64,
    ) -> Result<Self, SimulationError> {
        if conformation_weights.len() < 2 {
            return Err(SimulationError::Internal(format!(
                "conformationswap for '{}' needs at least two conformations",
                molecule_name
            )));
        }
        let distribution = WeightedIndex::new(conformation_weights).map_err(|e| {
            SimulationError::Internal(format!(
                "bad conformation weights for '{}': {}",
                molecule_name, e
            ))
        })?;
        Ok(Self {
            molecule,
            name: format!("conformationswap/{}", molecule_name),
            distribution,
            weight,
            statistics: MoveStatistics::default(),
        })
    }
}

impl Move for ConformationSwap {
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
        let candidates: Vec<usize> = context
            .trial
            .find_molecules(self.molecule, GroupSelection::Active)
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }
        let group_index = candidates[context.rng.gen_range(0..candidates.len())];
        let conformation = self.distribution.sample(context.rng);
        let cm = context.trial.groups[group_index]
            .mass_center
            .expect("active molecular group carries a mass center");
        context
            .trial
            .place_conformation(group_index, conformation, &cm);

        *change = Change::single_group(GroupChange {
            group_index,
            all: true,
            internal: true,
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
