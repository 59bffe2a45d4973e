//! Trial moves and their shared contract.
//!
//! A move (1) picks a random sub-action, (2) mutates the trial space, and
//! (3) fills the [`Change`] descriptor. It never evaluates energy; the
//! driver does that from the change. `bias` reports any energy-like
//! contribution the Hamiltonian cannot see, and `accept`/`reject` update
//! statistics only. State synchronization is the driver's job.

mod charge;
mod cluster;
mod conformation;
mod speciation;
mod translate;
mod volume;

pub use charge::ChargeMove;
pub use cluster::ClusterMove;
pub use conformation::ConformationSwap;
pub use speciation::SpeciationMove;
pub use translate::{AtomicTranslateRotate, MolecularTranslateRotate};
pub use volume::VolumeMove;

use crate::core::change::Change;
use crate::core::space::Space;
use crate::mc::error::SimulationError;
use crate::Point;
use nalgebra::UnitQuaternion;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// The process-wide move RNG. Its state is part of the checkpoint so replay
/// is bitwise reproducible.
pub type MoveRng = ChaCha8Rng;

/// Mutable view handed to a move while it proposes a trial.
pub struct MoveContext<'a> {
    /// The scratch state the move mutates freely.
    pub trial: &'a mut Space,
    /// The accepted state. Moves may apply *layout-neutral* slot
    /// permutations here (the speciation deletion mirror) and nothing else;
    /// physical coordinates of the accepted state are sacrosanct.
    pub peer: &'a mut Space,
    pub rng: &'a mut MoveRng,
}

/// Acceptance bookkeeping shared by all moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveStatistics {
    pub attempts: u64,
    pub accepted: u64,
}

impl MoveStatistics {
    pub fn record(&mut self, accepted: bool) {
        self.attempts += 1;
        self.accepted += u64::from(accepted);
    }

    pub fn acceptance_ratio(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.accepted as f64 / self.attempts as f64
        }
    }
}

/// Contract shared by all trial moves.
pub trait Move: Send {
    fn name(&self) -> &str;

    /// Relative draw weight in the propagator's categorical distribution.
    fn weight(&self) -> f64;

    /// Sample a sub-action, mutate the trial space, fill `change`. An empty
    /// change signals an infeasible draw and counts as a rejection.
    fn propose(
        &mut self,
        context: &mut MoveContext,
        change: &mut Change,
    ) -> Result<(), SimulationError>;

    /// Energy change not captured by the Hamiltonian, in kT.
    fn bias(&self, _change: &Change, _uold: f64, _unew: f64) -> f64 {
        0.0
    }

    fn accept(&mut self, change: &Change);
    fn reject(&mut self, change: &Change);

    fn statistics(&self) -> MoveStatistics;
}

/// Uniform random point on the unit sphere.
pub(crate) fn random_unit_vector(rng: &mut impl Rng) -> Point {
    let z: f64 = 2.0 * rng.gen::<f64>() - 1.0;
    let phi = 2.0 * std::f64::consts::PI * rng.gen::<f64>();
    let r = (1.0 - z * z).sqrt();
    Point::new(r * phi.cos(), r * phi.sin(), z)
}

/// Rotation by a uniform random axis and an angle uniform in
/// `[-half_width, half_width]`.
pub(crate) fn random_rotation(rng: &mut impl Rng, half_width: f64) -> UnitQuaternion<f64> {
    let axis = nalgebra::Unit::new_normalize(random_unit_vector(rng));
    let angle = half_width * 2.0 * (rng.gen::<f64>() - 0.5);
    UnitQuaternion::from_axis_angle(&axis, angle)
}

/// Displacement uniform in a cube of the given half-width, masked by a
/// per-axis direction vector.
pub(crate) fn random_displacement(rng: &mut impl Rng, half_width: f64, mask: &Point) -> Point {
    Point::new(
        half_width * 2.0 * (rng.gen::<f64>() - 0.5) * mask.x,
        half_width * 2.0 * (rng.gen::<f64>() - 0.5) * mask.y,
        half_width * 2.0 * (rng.gen::<f64>() - 0.5) * mask.z,
    )
}
