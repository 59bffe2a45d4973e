use crate::core::geometry::GeometryError;
use crate::core::topology::TopologyError;
use thiserror::Error;

/// Runtime failures of the MC core.
///
/// Everything here indicates a bug or broken input, never an "unlucky" move;
/// expected rejections (feasibility failures, hard-core overlaps, energy
/// overflow) are ordinary control flow and do not surface as errors.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("Bad reaction '{reaction}': {reason}")]
    BadReaction { reaction: String, reason: String },

    #[error("Canonic reservoir underflow in reaction '{0}'")]
    ReservoirUnderflow(String),

    #[error(
        "Mass center of group {group} drifted by {drift:.3e} from its stored value at step {step}"
    )]
    MassCenterDrift { group: usize, drift: f64, step: u64 },

    #[error("Active particle {particle} of group {group} lies outside the cell at step {step}")]
    ParticleOutsideCell {
        particle: usize,
        group: usize,
        step: u64,
    },

    #[error("Non-finite bonded energy in group {group} at step {step}")]
    NonFiniteBondEnergy { group: usize, step: u64 },

    #[error(
        "Energy drift {drift:.3e} kT exceeds tolerance {tolerance:.3e} after step {step}; \
         this indicates inconsistent incremental energy bookkeeping"
    )]
    EnergyDrift {
        drift: f64,
        tolerance: f64,
        step: u64,
    },

    #[error("I/O failure in analysis '{analysis}': {source}")]
    AnalysisIo {
        analysis: &'static str,
        source: std::io::Error,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}
