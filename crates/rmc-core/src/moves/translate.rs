use super::{
    random_displacement, random_rotation, Move, MoveContext, MoveStatistics,
};
use crate::core::change::{Change, GroupChange};
use crate::core::space::GroupSelection;
use crate::mc::error::SimulationError;
use crate::Point;
use rand::Rng;

/// Displaces (and for anisotropic particles, rotates) one random active atom
/// of a configured molecule kind.
pub struct AtomicTranslateRotate {
    molecule: usize,
    name: String,
    dp: f64,
    dprot: f64,
    direction: Point,
    weight: f64,
    statistics: MoveStatistics,
}

impl AtomicTranslateRotate {
    pub fn new(molecule: usize, molecule_name: &str, dp: f64, dprot: f64, direction: Point, weight: f64) -> Self {
        Self {
            molecule,
            name: format!("transrot/{}", molecule_name),
            dp,
            dprot,
            direction,
            weight,
            statistics: MoveStatistics::default(),
        }
    }
}

impl Move for AtomicTranslateRotate {
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
            return Ok(()); // nothing to move, empty change
        }
        let group_index = candidates[context.rng.gen_range(0..candidates.len())];
        let group = &context.trial.groups[group_index];
        let relative = context.rng.gen_range(0..group.len());
        let slot = group.absolute(relative);
        let molecular = !group.atomic;

        if self.dp > 0.0 {
            let displacement = random_displacement(context.rng, 0.5 * self.dp, &self.direction);
            let particle = &mut context.trial.particles[slot];
            particle.pos += displacement;
            context.trial.cell.boundary(&mut particle.pos);
        }
        if self.dprot > 0.0 {
            let quat = random_rotation(context.rng, 0.5 * self.dprot);
            let rot = quat.to_rotation_matrix().into_inner();
            context.trial.particles[slot].rotate(&quat, &rot);
        }
        if molecular {
            context.trial.update_mass_center(group_index);
        }

        *change = Change::single_group(GroupChange {
            group_index,
            internal: molecular,
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

/// Rigid-body translation and rotation of one random active molecular group.
pub struct MolecularTranslateRotate {
    molecule: usize,
    name: String,
    dp: f64,
    dprot: f64,
    direction: Point,
    weight: f64,
    statistics: MoveStatistics,
}

impl MolecularTranslateRotate {
    pub fn new(molecule: usize, molecule_name: &str, dp: f64, dprot: f64, direction: Point, weight: f64) -> Self {
        Self {
            molecule,
            name: format!("moltransrot/{}", molecule_name),
            dp,
            dprot,
            direction,
            weight,
            statistics: MoveStatistics::default(),
        }
    }
}

impl Move for MolecularTranslateRotate {
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

        if self.dp > 0.0 {
            let displacement = random_displacement(context.rng, 0.5 * self.dp, &self.direction);
            context.trial.translate_group(group_index, &displacement);
        }
        if self.dprot > 0.0 {
            let quat = random_rotation(context.rng, 0.5 * self.dprot);
            context.trial.rotate_group(group_index, &quat);
        }

        *change = Change::single_group(GroupChange {
            group_index,
            all: true,
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
