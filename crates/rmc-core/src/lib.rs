//! # RMC Core Library
//!
//! A Metropolis Monte Carlo engine for molecular and coarse-grained simulations
//! in the canonical, isobaric, grand-canonical, and reactive ensembles.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict layered architecture to ensure a clear
//! separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains the stateless data model (particles,
//!   groups, the simulation [`core::space::Space`]), periodic-boundary geometry,
//!   the immutable topology tables, and the [`core::change::Change`] descriptor
//!   that every trial move emits.
//!
//! - **[`energy`] and [`moves`]: The Logic Core.** Energy terms consume a
//!   `Change` and return the energy of the touched region only, which is what
//!   makes incremental re-evaluation of a large pair sum both correct and
//!   cheap. Moves mutate the trial space, fill the `Change`, and report any
//!   bias not captured by the Hamiltonian.
//!
//! - **[`mc`]: The Driver.** Holds the accepted and trial states, applies the
//!   Metropolis criterion, synchronizes the two states on every decision, and
//!   tracks the energy drift.
//!
//! - **[`config`], [`analysis`], [`io`]: The Service Layers.** Input schema and
//!   system builder, periodic observables, and state/trajectory files.

pub mod analysis;
pub mod config;
pub mod core;
pub mod energy;
pub mod io;
pub mod mc;
pub mod moves;

/// 3D point/vector type used throughout the crate.
pub type Point = nalgebra::Vector3<f64>;

/// Boltzmann constant in J/K.
pub const BOLTZMANN: f64 = 1.380649e-23;
/// Avogadro constant in 1/mol.
pub const AVOGADRO: f64 = 6.02214076e23;
/// Elementary charge in C.
pub const ELEMENTARY_CHARGE: f64 = 1.602176634e-19;
/// Vacuum permittivity in F/m.
pub const VACUUM_PERMITTIVITY: f64 = 8.8541878128e-12;

/// Bjerrum length in Å for a medium of the given relative dielectric constant
/// at the given temperature in Kelvin.
///
/// The Bjerrum length is the separation at which two elementary charges
/// interact with exactly 1 kT.
pub fn bjerrum_length(temperature: f64, dielectric: f64) -> f64 {
    ELEMENTARY_CHARGE * ELEMENTARY_CHARGE * 1e10
        / (4.0 * std::f64::consts::PI
            * VACUUM_PERMITTIVITY
            * dielectric
            * BOLTZMANN
            * temperature)
}
