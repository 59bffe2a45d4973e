//! Periodic observables sampled on the accepted state between sweeps.

mod density;
mod sanity;
mod virtual_volume;
mod widom;

pub use density::SpeciesDensity;
pub use sanity::SanityCheck;
pub use virtual_volume::VirtualVolume;
pub use widom::WidomInsertion;

use crate::core::space::Space;
use crate::energy::Hamiltonian;
use crate::mc::SimulationError;

/// A periodic observable. `sample` runs when `step % interval == 0`; it may
/// clone and perturb the space freely but must leave the original untouched.
pub trait Analysis: Send {
    fn name(&self) -> &'static str;

    fn interval(&self) -> u64;

    fn sample(
        &mut self,
        space: &Space,
        hamiltonian: &Hamiltonian,
        step: u64,
    ) -> Result<(), SimulationError>;

    /// Human-readable summary for the end-of-run report.
    fn report(&self) -> Option<String> {
        None
    }
}

#[derive(Default)]
pub struct AnalysisCollection {
    analyses: Vec<Box<dyn Analysis>>,
}

impl AnalysisCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, analysis: Box<dyn Analysis>) {
        self.analyses.push(analysis);
    }

    pub fn is_empty(&self) -> bool {
        self.analyses.is_empty()
    }

    /// Run every analysis whose interval divides the step counter.
    pub fn sample_all(
        &mut self,
        space: &Space,
        hamiltonian: &Hamiltonian,
        step: u64,
    ) -> Result<(), SimulationError> {
        for analysis in &mut self.analyses {
            if step % analysis.interval().max(1) == 0 {
                analysis.sample(space, hamiltonian, step)?;
            }
        }
        Ok(())
    }

    pub fn reports(&self) -> Vec<String> {
        self.analyses
            .iter()
            .filter_map(|analysis| {
                analysis
                    .report()
                    .map(|body| format!("{}: {}", analysis.name(), body))
            })
            .collect()
    }
}
