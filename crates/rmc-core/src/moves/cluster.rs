use super::{random_displacement, random_rotation, Move, MoveContext, MoveStatistics};
use crate::core::change::{Change, GroupChange};
use crate::core::space::{GroupSelection, Space};
use crate::mc::error::SimulationError;
use crate::Point;
use rand::Rng;

/// Rigid translation and rotation of a distance-defined cluster of molecules.
///
/// The cluster is grown by single linkage over mass-center distances from a
/// random seed. Detailed balance requires the reverse move to find the same
/// cluster; if the displaced cluster would have recruited different members,
/// `bias` returns +∞ and the move is rejected.
pub struct ClusterMove {
    molecules: Vec<usize>,
    threshold_squared: f64,
    dp: f64,
    dprot: f64,
    weight: f64,
    statistics: MoveStatistics,
    seed: usize,
    members: Vec<usize>,
    asymmetric: bool,
}

impl ClusterMove {
    pub fn new(molecules: Vec<usize>, threshold: f64, dp: f64, dprot: f64, weight: f64) -> Self {
        Self {
            molecules,
            threshold_squared: threshold * threshold,
            dp,
            dprot,
            weight,
            statistics: MoveStatistics::default(),
            seed: 0,
            members: Vec::new(),
            asymmetric: false,
        }
    }

    fn eligible(&self, space: &Space) -> Vec<usize> {
        self.molecules
            .iter()
            .flat_map(|&molecule| space.find_molecules(molecule, GroupSelection::Active))
            .collect()
    }

    /// Single-linkage cluster of `candidates` grown from `seed` over
    /// mass-center distances.
    fn grow_cluster(&self, space: &Space, seed: usize, candidates: &[usize]) -> Vec<usize> {
        let mut members = vec![seed];
        let mut frontier = vec![seed];
        while let Some(current) = frontier.pop() {
            let cm = space.groups[current]
                .mass_center
                .expect("cluster members are molecular groups");
            for &other in candidates {
                if members.contains(&other) {
                    continue;
                }
                let other_cm = space.groups[other]
                    .mass_center
                    .expect("cluster members are molecular groups");
                if space.cell.sqdist(&cm, &other_cm) <= self.threshold_squared {
                    members.push(other);
                    frontier.push(other);
                }
            }
        }
        members.sort_unstable();
        members
    }
}

impl Move for ClusterMove {
    fn name(&self) -> &str {
        "cluster"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn propose(
        &mut self,
        context: &mut MoveContext,
        change: &mut Change,
    ) -> Result<(), SimulationError> {
        let candidates = self.eligible(context.trial);
        if candidates.is_empty() {
            return Ok(());
        }
        self.seed = candidates[context.rng.gen_range(0..candidates.len())];
        self.members = self.grow_cluster(context.trial, self.seed, &candidates);

        // rotate about the unweighted center of the member mass centers,
        // accumulated with minimum-image shifts relative to the seed
        let seed_cm = context.trial.groups[self.seed].mass_center.unwrap();
        let mut center_shift = Point::zeros();
        for &member in &self.members {
            let cm = context.trial.groups[member].mass_center.unwrap();
            center_shift += context.trial.cell.vdist(&cm, &seed_cm);
        }
        let center = seed_cm + center_shift / self.members.len() as f64;

        let quat = random_rotation(context.rng, 0.5 * self.dprot);
        let displacement =
            random_displacement(context.rng, 0.5 * self.dp, &Point::new(1.0, 1.0, 1.0));
        for &member in &self.members {
            if self.dprot > 0.0 {
                let cm = context.trial.groups[member].mass_center.unwrap();
                let arm = context.trial.cell.vdist(&cm, &center);
                let rotated = center + quat * arm;
                let shift = rotated - cm;
                context.trial.translate_group(member, &shift);
                context.trial.rotate_group(member, &quat);
            }
            context.trial.translate_group(member, &displacement);
        }

        // reverse-move symmetry: regrow from the seed in the displaced state
        let candidates_after = self.eligible(context.trial);
        let reverse = self.grow_cluster(context.trial, self.seed, &candidates_after);
        self.asymmetric = reverse != self.members;

        change.groups = self
            .members
            .iter()
            .map(|&group_index| GroupChange {
                group_index,
                all: true,
                ..Default::default()
            })
            .collect();
        change.sort();
        Ok(())
    }

    fn bias(&self, change: &Change, _uold: f64, _unew: f64) -> f64 {
        if change.is_empty() || !self.asymmetric {
            0.0
        } else {
            f64::INFINITY
        }
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
