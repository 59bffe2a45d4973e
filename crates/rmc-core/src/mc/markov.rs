use super::error::SimulationError;
use super::metropolis::{ideal_term, metropolis};
use super::propagator::Propagator;
use crate::core::change::Change;
use crate::core::space::Space;
use crate::energy::Hamiltonian;
use crate::moves::{Move, MoveContext, MoveRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Outcome of a single Markov-chain step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Accepted,
    Rejected,
    /// The drawn move found nothing feasible to do; counts as a rejection.
    Null,
}

/// The MC driver: two Space+Hamiltonian replicas, the Metropolis criterion,
/// and the energy-drift ledger.
///
/// The accepted state is a monotone history that advances only on accepts;
/// the trial state is a scratchpad re-synced from it on rejects. Both paths
/// run through [`Space::sync`], which preserves the invariant that the two
/// states are bit-identical outside the latest change window.
pub struct MarkovChain {
    accepted: Space,
    trial: Space,
    accepted_hamiltonian: Hamiltonian,
    trial_hamiltonian: Hamiltonian,
    propagator: Propagator,
    rng: MoveRng,
    change: Change,
    initial_energy: f64,
    sum_of_deltas: f64,
    steps: u64,
    stop: Option<Arc<AtomicBool>>,
}

impl MarkovChain {
    pub fn new(
        space: Space,
        hamiltonian: Hamiltonian,
        propagator: Propagator,
        rng: MoveRng,
    ) -> Self {
        let trial = space.clone();
        let trial_hamiltonian = hamiltonian.clone();
        let initial_energy = hamiltonian.total_energy(&space);
        if !initial_energy.is_finite() {
            warn!(
                "initial configuration has non-finite energy; \
                 drift accounting starts once it relaxes"
            );
        }
        Self {
            accepted: space,
            trial,
            accepted_hamiltonian: hamiltonian,
            trial_hamiltonian,
            propagator,
            rng,
            change: Change::default(),
            initial_energy,
            sum_of_deltas: 0.0,
            steps: 0,
            stop: None,
        }
    }

    /// Install a cooperative stop flag, checked between sweeps only; a step
    /// in flight always completes so the two states stay synchronized.
    pub fn set_stop_flag(&mut self, stop: Arc<AtomicBool>) {
        self.stop = Some(stop);
    }

    pub fn accepted_space(&self) -> &Space {
        &self.accepted
    }

    pub fn hamiltonian(&self) -> &Hamiltonian {
        &self.accepted_hamiltonian
    }

    pub fn propagator(&self) -> &Propagator {
        &self.propagator
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn rng(&self) -> &MoveRng {
        &self.rng
    }

    /// Running estimate of the current energy from the accepted deltas.
    pub fn ledger_energy(&self) -> f64 {
        self.initial_energy + self.sum_of_deltas
    }

    /// Difference between a fresh global evaluation and the delta ledger.
    /// Should stay near zero for all seeds; divergence signals a bug in the
    /// incremental bookkeeping.
    pub fn energy_drift(&self) -> f64 {
        self.accepted_hamiltonian.total_energy(&self.accepted) - self.ledger_energy()
    }

    /// Fatal drift check with a relative tolerance.
    pub fn check_drift(&self, tolerance: f64) -> Result<(), SimulationError> {
        let current = self.accepted_hamiltonian.total_energy(&self.accepted);
        let drift = current - self.ledger_energy();
        let scale = current.abs().max(1.0);
        if !drift.is_finite() || drift.abs() / scale > tolerance {
            return Err(SimulationError::EnergyDrift {
                drift,
                tolerance,
                step: self.steps,
            });
        }
        Ok(())
    }

    /// One draw-propose-decide cycle.
    #[instrument(level = "trace", skip(self))]
    pub fn step(&mut self) -> Result<StepOutcome, SimulationError> {
        self.steps += 1;
        let index = self.propagator.sample(&mut self.rng);
        self.change.clear();

        let mv = self.propagator.get_mut(index);
        let mut context = MoveContext {
            trial: &mut self.trial,
            peer: &mut self.accepted,
            rng: &mut self.rng,
        };
        mv.propose(&mut context, &mut self.change)?;

        if self.change.is_empty() {
            mv.reject(&self.change);
            return Ok(StepOutcome::Null);
        }
        debug_assert!(self.change.is_sorted(), "move emitted an unsorted change");

        let u_old = self
            .accepted_hamiltonian
            .energy(&self.accepted, &self.change);
        let u_new = self.trial_hamiltonian.energy(&self.trial, &self.change);
        let du_energy = u_new - u_old;
        let du = du_energy
            + mv.bias(&self.change, u_old, u_new)
            + ideal_term(&self.trial, &self.accepted, &self.change);

        let outcome = if metropolis(du, &mut self.rng) {
            mv.accept(&self.change);
            self.accepted.sync(&self.trial, &self.change);
            self.accepted_hamiltonian
                .update_state(&self.accepted, &self.change);
            if du_energy.is_finite() {
                self.sum_of_deltas += du_energy;
            } else {
                // an overlap resolved: re-anchor the drift ledger
                self.initial_energy = self.accepted_hamiltonian.total_energy(&self.accepted);
                self.sum_of_deltas = 0.0;
            }
            StepOutcome::Accepted
        } else {
            mv.reject(&self.change);
            self.trial.sync(&self.accepted, &self.change);
            self.trial_hamiltonian
                .update_state(&self.trial, &self.change);
            StepOutcome::Rejected
        };

        #[cfg(debug_assertions)]
        self.assert_synchronized();

        Ok(outcome)
    }

    /// One sweep: the propagator's configured number of draws.
    pub fn sweep(&mut self) -> Result<(), SimulationError> {
        for _ in 0..self.propagator.repeats_per_sweep() {
            self.step()?;
        }
        Ok(())
    }

    /// Run `sweeps` sweeps, honoring the stop flag between sweeps.
    pub fn run(&mut self, sweeps: usize) -> Result<(), SimulationError> {
        for sweep in 0..sweeps {
            if let Some(stop) = &self.stop {
                if stop.load(Ordering::Relaxed) {
                    debug!(sweep, "stop flag observed, ending run early");
                    return Ok(());
                }
            }
            self.sweep()?;
        }
        Ok(())
    }

    /// Checkpoint hand-off of the state needed to resume bit-identically.
    pub fn checkpoint(&self) -> (&Space, &MoveRng) {
        (&self.accepted, &self.rng)
    }

    #[cfg(debug_assertions)]
    fn assert_synchronized(&self) {
        assert_eq!(
            self.accepted.particles, self.trial.particles,
            "accepted and trial particle arrays diverged after sync"
        );
        assert_eq!(
            self.accepted.groups, self.trial.groups,
            "accepted and trial group tables diverged after sync"
        );
        assert_eq!(self.accepted.reservoirs, self.trial.reservoirs);
    }
}
