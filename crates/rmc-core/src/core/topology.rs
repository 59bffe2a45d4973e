use crate::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TopologyError {
    #[error("Unknown atom name '{0}'")]
    UnknownAtom(String),
    #[error("Unknown molecule name '{0}'")]
    UnknownMolecule(String),
    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },
    #[error("Molecule '{0}' has no atoms")]
    EmptyMolecule(String),
    #[error("Molecule '{name}': conformation {index} has {got} positions, expected {expected}")]
    ConformationMismatch {
        name: String,
        index: usize,
        got: usize,
        expected: usize,
    },
    #[error("Molecule '{name}': bond references atom index {index} out of range")]
    BondOutOfRange { name: String, index: usize },
    #[error("Atomic molecule '{0}' cannot carry bonds")]
    AtomicWithBonds(String),
    #[error("Swap reaction '{0}' must have exactly one atomic species on each side")]
    BadSwapArity(String),
    #[error("Reaction '{0}': canonic reservoir must be non-negative")]
    NegativeReservoir(String),
    #[error("Reaction '{0}' has an empty side and is not canonic")]
    EmptySide(String),
}

/// Static per-atom-kind traits, looked up by id in the process-wide table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomKind {
    pub name: String,
    /// Lennard-Jones diameter (Å).
    pub sigma: f64,
    /// Lennard-Jones well depth (kT).
    pub epsilon: f64,
    /// Mass (g/mol).
    pub mass: f64,
    /// Template charge (e), stamped onto particles at creation and on swap.
    pub charge: f64,
    /// Scalar dipole moment (eÅ) for dipolar particles.
    #[serde(default)]
    pub dipole_moment: Option<f64>,
    /// Implicit species enter reactions only through their activity.
    #[serde(default)]
    pub implicit: bool,
}

/// Intramolecular two-body potential, indexed by relative atom positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    pub kind: BondKind,
    pub index: [usize; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BondKind {
    /// `u(r) = k/2 (r - req)²` with `k` in kT/Å² and `req` in Å.
    Harmonic { k: f64, req: f64 },
}

impl BondKind {
    #[inline]
    pub fn energy(&self, r: f64) -> f64 {
        match self {
            BondKind::Harmonic { k, req } => 0.5 * k * (r - req) * (r - req),
        }
    }
}

/// One rigid template geometry of a molecule, with a statistical weight used
/// by the conformation-swap move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conformation {
    pub weight: f64,
    pub positions: Vec<Point>,
}

/// Static per-molecule-kind data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoleculeKind {
    pub name: String,
    /// Index of this kind in the molecule table.
    pub id: usize,
    /// Atomic kinds model monatomic reservoirs: one group, variable size.
    pub atomic: bool,
    /// Constituent atom kind ids; for atomic kinds, the repeating unit.
    pub atoms: Vec<usize>,
    pub bonds: Vec<Bond>,
    /// Rigid conformation library; the first entry is the insertion template.
    pub conformations: Vec<Conformation>,
    /// Per-axis mask applied to random insertion directions.
    pub insert_directions: Point,
}

impl MoleculeKind {
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

/// A reversible reaction between molecule kinds.
///
/// Sides are multisets over molecule ids. Swap reactions additionally name
/// one atom kind per side whose identity changes in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionData {
    /// Canonical "reactants = products" string; used as statistics key.
    pub name: String,
    /// Natural log of the equilibrium constant, with implicit-species
    /// activities absorbed.
    pub lnk: f64,
    /// Bounded-reservoir bookkeeping.
    pub canonic: bool,
    /// Initial reservoir fill; ignored unless `canonic`.
    pub reservoir: i64,
    /// In-place identity change of one atom.
    pub swap: bool,
    /// (molecule id, multiplicity) pairs.
    pub reactants: Vec<(usize, usize)>,
    pub products: Vec<(usize, usize)>,
    /// For swap reactions: (reactant atom id, product atom id).
    #[serde(default)]
    pub swap_atoms: Option<(usize, usize)>,
}

impl ReactionData {
    /// Species to insert when running in the given direction.
    pub fn additions(&self, forward: bool) -> &[(usize, usize)] {
        if forward {
            &self.products
        } else {
            &self.reactants
        }
    }

    /// Species to delete when running in the given direction.
    pub fn deletions(&self, forward: bool) -> &[(usize, usize)] {
        self.additions(!forward)
    }

    /// (outgoing, incoming) atom kinds for a swap in the given direction.
    pub fn swap_pair(&self, forward: bool) -> Option<(usize, usize)> {
        self.swap_atoms
            .map(|(a, b)| if forward { (a, b) } else { (b, a) })
    }
}

/// Process-wide tables: write-once at topology load, read-many afterwards.
/// Shared between the accepted and trial spaces through an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub atoms: Vec<AtomKind>,
    pub molecules: Vec<MoleculeKind>,
    pub reactions: Vec<ReactionData>,
}

impl Topology {
    pub fn atom_index(&self, name: &str) -> Result<usize, TopologyError> {
        self.atoms
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| TopologyError::UnknownAtom(name.into()))
    }

    pub fn molecule_index(&self, name: &str) -> Result<usize, TopologyError> {
        self.molecules
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| TopologyError::UnknownMolecule(name.into()))
    }

    /// Structural validation; fatal with a precise message, no partial init.
    pub fn validate(&self) -> Result<(), TopologyError> {
        for (i, atom) in self.atoms.iter().enumerate() {
            if self.atoms[..i].iter().any(|a| a.name == atom.name) {
                return Err(TopologyError::DuplicateName {
                    kind: "atom",
                    name: atom.name.clone(),
                });
            }
        }
        for (i, mol) in self.molecules.iter().enumerate() {
            if self.molecules[..i].iter().any(|m| m.name == mol.name) {
                return Err(TopologyError::DuplicateName {
                    kind: "molecule",
                    name: mol.name.clone(),
                });
            }
            if mol.atoms.is_empty() {
                return Err(TopologyError::EmptyMolecule(mol.name.clone()));
            }
            if mol.atomic && !mol.bonds.is_empty() {
                return Err(TopologyError::AtomicWithBonds(mol.name.clone()));
            }
            for bond in &mol.bonds {
                for &index in &bond.index {
                    if index >= mol.atoms.len() {
                        return Err(TopologyError::BondOutOfRange {
                            name: mol.name.clone(),
                            index,
                        });
                    }
                }
            }
            for (index, conf) in mol.conformations.iter().enumerate() {
                if conf.positions.len() != mol.atoms.len() {
                    return Err(TopologyError::ConformationMismatch {
                        name: mol.name.clone(),
                        index,
                        got: conf.positions.len(),
                        expected: mol.atoms.len(),
                    });
                }
            }
        }
        for reaction in &self.reactions {
            if reaction.swap {
                let ok = reaction.swap_atoms.is_some()
                    && reaction.reactants.is_empty()
                    && reaction.products.is_empty();
                if !ok {
                    return Err(TopologyError::BadSwapArity(reaction.name.clone()));
                }
            } else if reaction.reactants.is_empty() && reaction.products.is_empty() {
                return Err(TopologyError::EmptySide(reaction.name.clone()));
            } else if (reaction.reactants.is_empty() || reaction.products.is_empty())
                && !reaction.canonic
            {
                // A one-sided reaction creates or destroys matter without
                // bound unless the reservoir caps it.
                return Err(TopologyError::EmptySide(reaction.name.clone()));
            }
            if reaction.canonic && reaction.reservoir < 0 {
                return Err(TopologyError::NegativeReservoir(reaction.name.clone()));
            }
        }
        Ok(())
    }
}
