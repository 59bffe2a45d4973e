use crate::core::geometry::Cell;
use crate::core::group::Group;
use crate::core::particle::Particle;
use crate::core::space::Space;
use crate::core::topology::Topology;
use crate::moves::MoveRng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateIoError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("JSON state error for '{path}': {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("Binary state error for '{path}': {source}")]
    Binary {
        path: String,
        source: bincode::Error,
    },
}

/// The complete simulation state as one structured document.
///
/// Inactive slots are saved verbatim; they are real state, not padding. The
/// binary encoding is the canonical one for floating-point fidelity, the
/// JSON encoding is for human eyes and tooling. Saving the RNG makes a
/// resumed run bitwise reproducible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateFile {
    pub topology: Topology,
    pub cell: Cell,
    pub particles: Vec<Particle>,
    pub groups: Vec<Group>,
    pub reservoirs: Vec<i64>,
    pub step: u64,
    #[serde(default)]
    pub rng: Option<MoveRng>,
}

impl StateFile {
    pub fn from_simulation(space: &Space, step: u64, rng: Option<&MoveRng>) -> Self {
        Self {
            topology: (*space.topology).clone(),
            cell: space.cell.clone(),
            particles: space.particles.clone(),
            groups: space.groups.clone(),
            reservoirs: space.reservoirs.clone(),
            step,
            rng: rng.cloned(),
        }
    }

    /// Rebuild the live state; the topology moves behind a fresh `Arc`.
    pub fn into_space(self) -> (Space, Option<MoveRng>, u64) {
        let space = Space {
            cell: self.cell,
            particles: self.particles,
            groups: self.groups,
            topology: Arc::new(self.topology),
            reservoirs: self.reservoirs,
        };
        (space, self.rng, self.step)
    }

    pub fn save_json(&self, path: &Path) -> Result<(), StateIoError> {
        let file = File::create(path).map_err(|e| StateIoError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).map_err(|e| StateIoError::Json {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn load_json(path: &Path) -> Result<Self, StateIoError> {
        let file = File::open(path).map_err(|e| StateIoError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| StateIoError::Json {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn save_binary(&self, path: &Path) -> Result<(), StateIoError> {
        let file = File::create(path).map_err(|e| StateIoError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        bincode::serialize_into(BufWriter::new(file), self).map_err(|e| StateIoError::Binary {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn load_binary(path: &Path) -> Result<Self, StateIoError> {
        let file = File::open(path).map_err(|e| StateIoError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        bincode::deserialize_from(BufReader::new(file)).map_err(|e| StateIoError::Binary {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Encoding by extension: `.json` is textual, anything else binary.
    pub fn save(&self, path: &Path) -> Result<(), StateIoError> {
        if path.extension().is_some_and(|ext| ext == "json") {
            self.save_json(path)
        } else {
            self.save_binary(path)
        }
    }

    pub fn load(path: &Path) -> Result<Self, StateIoError> {
        if path.extension().is_some_and(|ext| ext == "json") {
            Self::load_json(path)
        } else {
            Self::load_binary(path)
        }
    }
}
