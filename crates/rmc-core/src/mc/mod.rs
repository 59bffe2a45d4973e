//! The MC driver: dual accepted/trial states, Metropolis acceptance with
//! ideal-gas corrections, the weighted move propagator, and drift tracking.

pub mod error;
mod markov;
mod metropolis;
mod propagator;

pub use error::SimulationError;
pub use markov::{MarkovChain, StepOutcome};
pub use metropolis::{ideal_term, metropolis};
pub use propagator::Propagator;
