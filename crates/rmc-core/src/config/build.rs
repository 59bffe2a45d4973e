use super::{
    AnalysisConfig, AtomConfig, BondConfig, ConfigError, EnergyConfig, GeometryConfig,
    InputConfig, InsertConfig, MoleculeConfig, MoveConfig, PotentialKind, ReactionConfig,
    SeedName, SeedPolicy,
};
use crate::analysis::{
    Analysis, AnalysisCollection, SanityCheck, SpeciesDensity, VirtualVolume, WidomInsertion,
};
use crate::core::geometry::Cell;
use crate::core::group::Group;
use crate::core::particle::{Particle, Shape};
use crate::core::space::Space;
use crate::core::topology::{
    AtomKind, Bond, BondKind, Conformation, MoleculeKind, ReactionData, Topology,
};
use crate::energy::{
    CellContainment, Coulomb, Hamiltonian, HardSphere, IntramolecularBonds, LennardJones,
    Nonbonded, PairPotential,
};
use crate::io::{ChargeRadiusTrajectory, XyzTrajectory};
use crate::mc::{MarkovChain, Propagator};
use crate::moves::{
    AtomicTranslateRotate, ChargeMove, ClusterMove, ConformationSwap, MolecularTranslateRotate,
    Move, MoveRng, SpeciationMove, VolumeMove,
};
use crate::{bjerrum_length, Point, AVOGADRO, BOLTZMANN};
use rand::SeedableRng;
use std::f64::consts::PI;
use std::sync::Arc;
use tracing::{debug, info};

/// Seed used by the `"fixed"` policy.
const FIXED_SEED: u64 = 4711;

/// A fully wired simulation, ready to run.
pub struct Simulation {
    pub chain: MarkovChain,
    pub analyses: AnalysisCollection,
    pub macro_cycles: usize,
    pub micro_sweeps: usize,
}

/// Turn a validated input document into live state. Fails fast with a
/// precise message; nothing is partially initialized on error.
pub fn build(config: &InputConfig) -> Result<Simulation, ConfigError> {
    // kJ/mol -> kT at the configured temperature
    let kjmol_to_kt = 1000.0 / (AVOGADRO * BOLTZMANN * config.temperature);

    let atoms = build_atoms(&config.atomlist, kjmol_to_kt);
    let molecules = build_molecules(&config.moleculelist, &atoms, kjmol_to_kt)?;
    let reactions = build_reactions(&config.reactionlist, &atoms, &molecules)?;
    let topology = Topology {
        atoms,
        molecules,
        reactions,
    };
    topology.validate()?;
    let topology = Arc::new(topology);

    let (mut move_rng, mut placement_rng) = seeded_rngs(config.random);
    let cell = build_cell(&config.geometry)?;
    let space = populate(
        cell,
        topology.clone(),
        &config.insertmolecules,
        &mut placement_rng,
    )?;
    check_reaction_matter(&space)?;

    let hamiltonian = build_hamiltonian(&config.energy, config.temperature);
    let moves = build_moves(&config.moves, &space)?;
    let propagator = Propagator::new(moves).map_err(ConfigError::Moves)?;
    let analyses = build_analyses(&config.analysis, &space, &mut move_rng)?;

    info!(
        atoms = topology.atoms.len(),
        molecules = topology.molecules.len(),
        reactions = topology.reactions.len(),
        particles = space.particles.len(),
        "simulation assembled"
    );

    Ok(Simulation {
        chain: MarkovChain::new(space, hamiltonian, propagator, move_rng),
        analyses,
        macro_cycles: config.mcloop.macro_cycles,
        micro_sweeps: config.mcloop.micro,
    })
}

fn seeded_rngs(policy: SeedPolicy) -> (MoveRng, MoveRng) {
    match policy {
        SeedPolicy::Seed(seed) => (
            MoveRng::seed_from_u64(seed),
            MoveRng::seed_from_u64(seed.wrapping_add(1)),
        ),
        SeedPolicy::Named(SeedName::Fixed) => (
            MoveRng::seed_from_u64(FIXED_SEED),
            MoveRng::seed_from_u64(FIXED_SEED + 1),
        ),
        SeedPolicy::Named(SeedName::Default) | SeedPolicy::Unset => {
            (MoveRng::from_entropy(), MoveRng::from_entropy())
        }
    }
}

fn build_cell(geometry: &GeometryConfig) -> Result<Cell, ConfigError> {
    let cell = match geometry {
        GeometryConfig::Cuboid { length } => {
            Cell::cuboid(Point::new(length[0], length[1], length[2]))
        }
        GeometryConfig::Cube { side } => Cell::cube(*side),
    };
    cell.map_err(|e| ConfigError::BadValue {
        key: "geometry",
        reason: e.to_string(),
    })
}

fn build_atoms(atomlist: &[AtomConfig], kjmol_to_kt: f64) -> Vec<AtomKind> {
    atomlist
        .iter()
        .map(|atom| AtomKind {
            name: atom.name.clone(),
            sigma: atom.sigma,
            epsilon: atom.eps * kjmol_to_kt,
            mass: atom.mw,
            charge: atom.q,
            dipole_moment: atom.mu,
            implicit: atom.implicit,
        })
        .collect()
}

fn build_molecules(
    moleculelist: &[MoleculeConfig],
    atoms: &[AtomKind],
    kjmol_to_kt: f64,
) -> Result<Vec<MoleculeKind>, ConfigError> {
    let atom_index = |name: &str| -> Result<usize, ConfigError> {
        atoms
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| crate::core::topology::TopologyError::UnknownAtom(name.into()).into())
    };

    moleculelist
        .iter()
        .enumerate()
        .map(|(id, molecule)| {
            let atom_ids = molecule
                .atoms
                .iter()
                .map(|name| atom_index(name))
                .collect::<Result<Vec<_>, _>>()?;

            let mut conformations: Vec<Conformation> = molecule
                .conformations
                .iter()
                .map(|conf| Conformation {
                    weight: conf.weight,
                    positions: conf.positions.iter().map(|p| Point::from(*p)).collect(),
                })
                .collect();
            if let Some(structure) = &molecule.structure {
                conformations.insert(
                    0,
                    Conformation {
                        weight: 1.0,
                        positions: structure.iter().map(|p| Point::from(*p)).collect(),
                    },
                );
            }
            if !molecule.atomic && conformations.is_empty() {
                return Err(ConfigError::MissingStructure(molecule.name.clone()));
            }

            let bonds = molecule
                .bonds
                .iter()
                .map(|bond| match bond {
                    BondConfig::Harmonic { index, k, req } => Bond {
                        kind: BondKind::Harmonic {
                            k: k * kjmol_to_kt,
                            req: *req,
                        },
                        index: *index,
                    },
                })
                .collect();

            Ok(MoleculeKind {
                name: molecule.name.clone(),
                id,
                atomic: molecule.atomic,
                atoms: atom_ids,
                bonds,
                conformations,
                insert_directions: Point::from(molecule.insdir),
            })
        })
        .collect()
}

/// Parse `"A + B = C + D"` sides into molecule multisets. Names of implicit
/// atom kinds are absorbed into lnK and dropped; swap reactions take exactly
/// one explicit atom kind per side instead.
fn build_reactions(
    reactionlist: &[ReactionConfig],
    atoms: &[AtomKind],
    molecules: &[MoleculeKind],
) -> Result<Vec<ReactionData>, ConfigError> {
    reactionlist
        .iter()
        .map(|reaction| {
            let bad = |reason: &str| ConfigError::BadReaction {
                reaction: reaction.reaction.clone(),
                reason: reason.into(),
            };
            let mut sides = reaction.reaction.split('=');
            let (Some(lhs), Some(rhs), None) = (sides.next(), sides.next(), sides.next()) else {
                return Err(bad("expected exactly one '='"));
            };
            let tokenize = |side: &str| -> Vec<String> {
                side.split('+')
                    .map(|token| token.trim().to_string())
                    .filter(|token| !token.is_empty())
                    .collect()
            };
            let (lhs, rhs) = (tokenize(lhs), tokenize(rhs));

            if reaction.swap {
                let resolve_atom = |tokens: &[String]| -> Result<usize, ConfigError> {
                    let [token] = tokens else {
                        return Err(bad("swap reactions take exactly one atom per side"));
                    };
                    atoms
                        .iter()
                        .position(|a| a.name == *token)
                        .ok_or_else(|| bad(&format!("unknown atom '{}'", token)))
                };
                return Ok(ReactionData {
                    name: reaction.reaction.clone(),
                    lnk: reaction.lnk,
                    canonic: reaction.canonic,
                    reservoir: reaction.reservoir,
                    swap: true,
                    reactants: vec![],
                    products: vec![],
                    swap_atoms: Some((resolve_atom(&lhs)?, resolve_atom(&rhs)?)),
                });
            }

            let resolve_side = |tokens: &[String]| -> Result<Vec<(usize, usize)>, ConfigError> {
                let mut side: Vec<(usize, usize)> = Vec::new();
                for token in tokens {
                    if let Some(id) = molecules.iter().position(|m| m.name == *token) {
                        match side.iter_mut().find(|(molecule, _)| *molecule == id) {
                            Some((_, count)) => *count += 1,
                            None => side.push((id, 1)),
                        }
                    } else if atoms.iter().any(|a| a.name == *token && a.implicit) {
                        debug!(species = %token, "implicit species absorbed into lnK");
                    } else {
                        return Err(bad(&format!("unknown species '{}'", token)));
                    }
                }
                Ok(side)
            };
            Ok(ReactionData {
                name: reaction.reaction.clone(),
                lnk: reaction.lnk,
                canonic: reaction.canonic,
                reservoir: reaction.reservoir,
                swap: false,
                reactants: resolve_side(&lhs)?,
                products: resolve_side(&rhs)?,
                swap_atoms: None,
            })
        })
        .collect()
}

/// Allocate particles and groups per the insertion list: reservoirs as one
/// group with an inactive tail, molecules as independent groups placed at
/// random poses (inactive copies keep their template for later activation).
fn populate(
    cell: Cell,
    topology: Arc<Topology>,
    insertions: &[InsertConfig],
    rng: &mut MoveRng,
) -> Result<Space, ConfigError> {
    let mut space = Space::new(cell, topology.clone());
    for insertion in insertions {
        let molecule = topology.molecule_index(&insertion.name)?;
        let kind = &topology.molecules[molecule];
        if insertion.inactive > insertion.n {
            return Err(ConfigError::BadValue {
                key: "insertmolecules",
                reason: format!(
                    "'{}': inactive {} exceeds n {}",
                    insertion.name, insertion.inactive, insertion.n
                ),
            });
        }
        if kind.atomic {
            if space.groups.iter().any(|g| g.molecule == molecule) {
                return Err(ConfigError::DuplicateReservoir(insertion.name.clone()));
            }
            let begin = space.particles.len();
            for offset in 0..insertion.n {
                let atom_id = kind.atoms[offset % kind.atoms.len()];
                let mut particle = Particle::new(atom_id, Point::zeros());
                particle.charge = topology.atoms[atom_id].charge;
                particle.shape = topology.atoms[atom_id].dipole_moment.map(|mulen| {
                    Shape::Dipole {
                        mu: crate::moves::random_unit_vector(rng),
                        mulen,
                    }
                });
                space.cell.random_pos(&mut particle.pos, rng);
                particle.pos.component_mul_assign(&kind.insert_directions);
                space.particles.push(particle);
            }
            let mut group = Group::new(molecule, true, begin, insertion.n);
            group.deactivate(insertion.inactive);
            space.groups.push(group);
        } else {
            for copy in 0..insertion.n {
                let begin = space.particles.len();
                let capacity = kind.len();
                for _ in 0..capacity {
                    space.particles.push(Particle::new(0, Point::zeros()));
                }
                space.groups.push(Group::new(molecule, false, begin, capacity));
                let index = space.groups.len() - 1;

                let mut cm = Point::zeros();
                space.cell.random_pos(&mut cm, rng);
                cm.component_mul_assign(&kind.insert_directions);
                space.place_conformation(index, 0, &cm);
                let quat = crate::moves::random_rotation(rng, PI);
                space.rotate_group(index, &quat);
                if copy >= insertion.n - insertion.inactive {
                    let size = space.groups[index].len();
                    space.groups[index].deactivate(size);
                }
            }
        }
    }
    Ok(space)
}

/// Every explicit reaction species needs allocated groups to act on.
fn check_reaction_matter(space: &Space) -> Result<(), ConfigError> {
    for reaction in &space.topology.reactions {
        for &(molecule, _) in reaction.reactants.iter().chain(&reaction.products) {
            if !space.groups.iter().any(|g| g.molecule == molecule) {
                return Err(ConfigError::BadReaction {
                    reaction: reaction.name.clone(),
                    reason: format!(
                        "species '{}' has no inserted groups",
                        space.topology.molecules[molecule].name
                    ),
                });
            }
        }
    }
    Ok(())
}

fn build_hamiltonian(energies: &[EnergyConfig], temperature: f64) -> Hamiltonian {
    let mut hamiltonian = Hamiltonian::new();
    hamiltonian.push(Box::new(CellContainment));
    for energy in energies {
        match energy {
            EnergyConfig::Nonbonded {
                potentials,
                cutoff,
                dielectric,
            } => {
                let potentials: Vec<Box<dyn PairPotential>> = potentials
                    .iter()
                    .map(|kind| -> Box<dyn PairPotential> {
                        match kind {
                            PotentialKind::Lennardjones => Box::new(LennardJones),
                            PotentialKind::Hardsphere => Box::new(HardSphere),
                            PotentialKind::Coulomb => Box::new(Coulomb {
                                bjerrum: bjerrum_length(temperature, *dielectric),
                            }),
                        }
                    })
                    .collect();
                hamiltonian.push(Box::new(Nonbonded::new(potentials, *cutoff)));
            }
            EnergyConfig::Bonded {} => hamiltonian.push(Box::new(IntramolecularBonds)),
        }
    }
    hamiltonian
}

fn build_moves(
    configs: &[MoveConfig],
    space: &Space,
) -> Result<Vec<Box<dyn Move>>, ConfigError> {
    let topology = &space.topology;
    let molecule_index = |name: &str| -> Result<usize, ConfigError> {
        Ok(topology.molecule_index(name)?)
    };

    configs
        .iter()
        .map(|config| -> Result<Box<dyn Move>, ConfigError> {
            Ok(match config {
                MoveConfig::Transrot {
                    molecule,
                    dp,
                    dprot,
                    dir,
                    repeat,
                } => {
                    let id = molecule_index(molecule)?;
                    Box::new(AtomicTranslateRotate::new(
                        id,
                        molecule,
                        *dp,
                        *dprot,
                        Point::from(*dir),
                        *repeat,
                    ))
                }
                MoveConfig::Moltransrot {
                    molecule,
                    dp,
                    dprot,
                    dir,
                    repeat,
                } => {
                    let id = molecule_index(molecule)?;
                    Box::new(MolecularTranslateRotate::new(
                        id,
                        molecule,
                        *dp,
                        *dprot,
                        Point::from(*dir),
                        *repeat,
                    ))
                }
                MoveConfig::Volume {
                    dv,
                    pressure,
                    method,
                    repeat,
                } => Box::new(VolumeMove::new(*dv, *pressure, *method, *repeat)),
                MoveConfig::Conformationswap { molecule, repeat } => {
                    let id = molecule_index(molecule)?;
                    let weights: Vec<f64> = topology.molecules[id]
                        .conformations
                        .iter()
                        .map(|c| c.weight)
                        .collect();
                    Box::new(
                        ConformationSwap::new(id, molecule, &weights, *repeat)
                            .map_err(|e| ConfigError::Moves(e.to_string()))?,
                    )
                }
                MoveConfig::Rcmc { repeat } => {
                    if topology.reactions.is_empty() {
                        return Err(ConfigError::Moves(
                            "rcmc requires a non-empty reactionlist".into(),
                        ));
                    }
                    Box::new(SpeciationMove::new(topology.reactions.len(), *repeat))
                }
                MoveConfig::Charge { index, dq, repeat } => {
                    if *index >= space.particles.len() {
                        return Err(ConfigError::Moves(format!(
                            "charge move index {} out of range",
                            index
                        )));
                    }
                    Box::new(ChargeMove::new(*index, *dq, *repeat))
                }
                MoveConfig::Cluster {
                    molecules,
                    threshold,
                    dp,
                    dprot,
                    repeat,
                } => {
                    let ids = molecules
                        .iter()
                        .map(|name| molecule_index(name))
                        .collect::<Result<Vec<_>, _>>()?;
                    if let Some(&id) = ids.iter().find(|&&id| topology.molecules[id].atomic) {
                        return Err(ConfigError::Moves(format!(
                            "cluster move requires molecular kinds, '{}' is atomic",
                            topology.molecules[id].name
                        )));
                    }
                    Box::new(ClusterMove::new(ids, *threshold, *dp, *dprot, *repeat))
                }
            })
        })
        .collect()
}

fn build_analyses(
    configs: &[AnalysisConfig],
    space: &Space,
    rng: &mut MoveRng,
) -> Result<AnalysisCollection, ConfigError> {
    let mut collection = AnalysisCollection::new();
    for config in configs {
        let analysis: Box<dyn Analysis> = match config {
            AnalysisConfig::Sanity { interval } => Box::new(SanityCheck::new(*interval)),
            AnalysisConfig::Virtualvolume { interval, dv } => {
                Box::new(VirtualVolume::new(*interval, *dv))
            }
            AnalysisConfig::Widom {
                interval,
                molecule,
                ninsert,
            } => {
                let id = space.topology.molecule_index(molecule)?;
                Box::new(WidomInsertion::new(
                    *interval,
                    id,
                    *ninsert,
                    MoveRng::from_rng(&mut *rng).expect("infallible chacha reseed"),
                ))
            }
            AnalysisConfig::Density { interval } => Box::new(SpeciesDensity::new(
                *interval,
                space.topology.molecules.len(),
            )),
            AnalysisConfig::Xyzfile { interval, file } => Box::new(
                XyzTrajectory::create(file, *interval).map_err(|e| ConfigError::Io {
                    path: file.display().to_string(),
                    source: e,
                })?,
            ),
            AnalysisConfig::Qrfile { interval, file } => Box::new(
                ChargeRadiusTrajectory::create(file, *interval).map_err(|e| ConfigError::Io {
                    path: file.display().to_string(),
                    source: e,
                })?,
            ),
        };
        collection.push(analysis);
    }
    Ok(collection)
}
