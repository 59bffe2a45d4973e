//! Hierarchical key-value input schema and the builder that turns a parsed
//! document into a runnable simulation.
//!
//! All quantities cross the boundary in user units (Å, Kelvin, kJ/mol,
//! elementary charges) and are converted to internal kT units here, nowhere
//! else.

mod build;

pub use build::{build, Simulation};

use crate::core::topology::TopologyError;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error("Bad reaction '{reaction}': {reason}")]
    BadReaction { reaction: String, reason: String },
    #[error("Molecule '{0}' needs a structure or conformation list")]
    MissingStructure(String),
    #[error("Atomic reservoir '{0}' declared more than once in insertmolecules")]
    DuplicateReservoir(String),
    #[error("Invalid value for {key}: {reason}")]
    BadValue { key: &'static str, reason: String },
    #[error("Move configuration error: {0}")]
    Moves(String),
}

/// Top-level simulation input.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    /// Temperature in Kelvin; fixes the kT energy unit.
    pub temperature: f64,
    #[serde(default)]
    pub random: SeedPolicy,
    pub geometry: GeometryConfig,
    pub mcloop: McLoopConfig,
    pub atomlist: Vec<AtomConfig>,
    pub moleculelist: Vec<MoleculeConfig>,
    pub insertmolecules: Vec<InsertConfig>,
    #[serde(default)]
    pub reactionlist: Vec<ReactionConfig>,
    pub energy: Vec<EnergyConfig>,
    pub moves: Vec<MoveConfig>,
    #[serde(default)]
    pub analysis: Vec<AnalysisConfig>,
}

impl InputConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&text)
    }
}

/// Seed policy: `"default"` draws from the OS, `"fixed"` is a hardcoded
/// constant for quick reproducibility, an integer is an explicit seed.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq)]
#[serde(untagged)]
pub enum SeedPolicy {
    Seed(u64),
    Named(SeedName),
    #[serde(skip)]
    #[default]
    Unset,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SeedName {
    Default,
    Fixed,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeometryConfig {
    Cuboid { length: [f64; 3] },
    Cube { side: f64 },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct McLoopConfig {
    /// Outer cycles; analyses report and drift is checked per cycle.
    #[serde(rename = "macro")]
    pub macro_cycles: usize,
    /// Sweeps per outer cycle.
    pub micro: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AtomConfig {
    pub name: String,
    /// Lennard-Jones diameter (Å).
    #[serde(default)]
    pub sigma: f64,
    /// Lennard-Jones well depth (kJ/mol).
    #[serde(default)]
    pub eps: f64,
    /// Molar mass (g/mol).
    #[serde(default = "default_mass")]
    pub mw: f64,
    /// Charge (e).
    #[serde(default)]
    pub q: f64,
    /// Scalar dipole moment (eÅ).
    #[serde(default)]
    pub mu: Option<f64>,
    #[serde(default)]
    pub implicit: bool,
}

fn default_mass() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoleculeConfig {
    pub name: String,
    #[serde(default)]
    pub atomic: bool,
    pub atoms: Vec<String>,
    #[serde(default)]
    pub bonds: Vec<BondConfig>,
    /// Single-conformation shorthand.
    #[serde(default)]
    pub structure: Option<Vec<[f64; 3]>>,
    #[serde(default)]
    pub conformations: Vec<ConformationConfig>,
    /// Per-axis insertion mask.
    #[serde(default = "default_insdir")]
    pub insdir: [f64; 3],
}

fn default_insdir() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BondConfig {
    Harmonic {
        index: [usize; 2],
        /// Force constant (kJ/mol/Å²).
        k: f64,
        /// Equilibrium length (Å).
        req: f64,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConformationConfig {
    pub weight: f64,
    pub positions: Vec<[f64; 3]>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InsertConfig {
    pub name: String,
    pub n: usize,
    /// How many of the inserted copies (or reservoir slots) start inactive.
    #[serde(default)]
    pub inactive: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactionConfig {
    /// `"reactants = products"`; multiplicity by repetition.
    pub reaction: String,
    #[serde(default)]
    pub lnk: f64,
    #[serde(default)]
    pub canonic: bool,
    #[serde(default)]
    pub reservoir: i64,
    #[serde(default)]
    pub swap: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EnergyConfig {
    Nonbonded {
        potentials: Vec<PotentialKind>,
        #[serde(default)]
        cutoff: Option<f64>,
        /// Relative dielectric constant for the Coulomb term.
        #[serde(default = "default_dielectric")]
        dielectric: f64,
    },
    Bonded {},
}

fn default_dielectric() -> f64 {
    78.7
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PotentialKind {
    Lennardjones,
    Coulomb,
    Hardsphere,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MoveConfig {
    Moltransrot {
        molecule: String,
        dp: f64,
        dprot: f64,
        #[serde(default = "default_insdir")]
        dir: [f64; 3],
        #[serde(default = "default_repeat")]
        repeat: f64,
    },
    Transrot {
        molecule: String,
        dp: f64,
        #[serde(default)]
        dprot: f64,
        #[serde(default = "default_insdir")]
        dir: [f64; 3],
        #[serde(default = "default_repeat")]
        repeat: f64,
    },
    Volume {
        /// Half-width of the ln V displacement.
        dv: f64,
        /// External pressure (kT/Å³).
        #[serde(default)]
        pressure: f64,
        #[serde(default)]
        method: crate::core::geometry::VolumeScalePolicy,
        #[serde(default = "default_repeat")]
        repeat: f64,
    },
    Conformationswap {
        molecule: String,
        #[serde(default = "default_repeat")]
        repeat: f64,
    },
    Rcmc {
        #[serde(default = "default_repeat")]
        repeat: f64,
    },
    Charge {
        index: usize,
        dq: f64,
        #[serde(default = "default_repeat")]
        repeat: f64,
    },
    Cluster {
        molecules: Vec<String>,
        threshold: f64,
        dp: f64,
        dprot: f64,
        #[serde(default = "default_repeat")]
        repeat: f64,
    },
}

fn default_repeat() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnalysisConfig {
    Sanity {
        #[serde(default = "default_interval")]
        interval: u64,
    },
    Virtualvolume {
        #[serde(default = "default_interval")]
        interval: u64,
        dv: f64,
    },
    Widom {
        #[serde(default = "default_interval")]
        interval: u64,
        molecule: String,
        #[serde(default = "default_ninsert")]
        ninsert: usize,
    },
    Density {
        #[serde(default = "default_interval")]
        interval: u64,
    },
    Xyzfile {
        #[serde(default = "default_interval")]
        interval: u64,
        file: PathBuf,
    },
    Qrfile {
        #[serde(default = "default_interval")]
        interval: u64,
        file: PathBuf,
    },
}

fn default_interval() -> u64 {
    100
}

fn default_ninsert() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
temperature = 298.15
random = "fixed"

[geometry]
type = "cube"
side = 40.0

[mcloop]
macro = 5
micro = 100

[[atomlist]]
name = "Na"
sigma = 4.0
eps = 0.05
mw = 22.99
q = 1.0

[[moleculelist]]
name = "Na"
atomic = true
atoms = ["Na"]

[[insertmolecules]]
name = "Na"
n = 20

[[energy]]
type = "nonbonded"
potentials = ["lennardjones", "coulomb"]
cutoff = 14.0

[[moves]]
type = "transrot"
molecule = "Na"
dp = 1.0
repeat = 20
"#;

    #[test]
    fn minimal_document_parses() {
        let config = InputConfig::from_toml(MINIMAL).unwrap();
        assert_eq!(config.temperature, 298.15);
        assert_eq!(config.random, SeedPolicy::Named(SeedName::Fixed));
        assert_eq!(config.mcloop.macro_cycles, 5);
        assert_eq!(config.atomlist.len(), 1);
        assert!(matches!(config.geometry, GeometryConfig::Cube { side } if side == 40.0));
        match &config.moves[0] {
            MoveConfig::Transrot { molecule, repeat, .. } => {
                assert_eq!(molecule, "Na");
                assert_eq!(*repeat, 20.0);
            }
            other => panic!("unexpected move {:?}", other),
        }
    }

    #[test]
    fn integer_seed_is_accepted() {
        let text = MINIMAL.replace("random = \"fixed\"", "random = 12345");
        let config = InputConfig::from_toml(&text).unwrap();
        assert_eq!(config.random, SeedPolicy::Seed(12345));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let text = format!("{}\nnot_a_key = 1\n", MINIMAL);
        assert!(InputConfig::from_toml(&text).is_err());
    }

    #[test]
    fn volume_method_names_match_the_scale_policies() {
        let text = format!(
            "{}\n[[moves]]\ntype = \"volume\"\ndv = 0.2\nmethod = \"xy\"\n",
            MINIMAL
        );
        let config = InputConfig::from_toml(&text).unwrap();
        match config.moves.last().unwrap() {
            MoveConfig::Volume { method, .. } => {
                assert_eq!(
                    *method,
                    crate::core::geometry::VolumeScalePolicy::IsotropicXY
                );
            }
            other => panic!("unexpected move {:?}", other),
        }
    }
}
