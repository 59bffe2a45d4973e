use super::{random_rotation, Move, MoveContext, MoveStatistics};
use crate::core::change::{Change, GroupChange};
use crate::core::particle::Shape;
use crate::core::space::GroupSelection;
use crate::core::topology::ReactionData;
use crate::energy::group_bond_energy;
use crate::mc::error::SimulationError;
use crate::Point;
use rand::Rng;
use std::f64::consts::PI;
use tracing::trace;

/// Reactive speciation: transfers matter between group reservoirs according
/// to a randomly drawn reaction and direction.
///
/// Deletions shuffle the doomed atom to the end of the active region and the
/// identical slot swap is mirrored into the peer space, so the restricted
/// energy sum evaluated on the accepted state sees the very particle being
/// removed, and a later sync copies the correct slot in either direction.
/// Insufficient matter is not an error; it yields an empty change, which the
/// driver books as a rejection.
pub struct SpeciationMove {
    weight: f64,
    statistics: MoveStatistics,
    per_reaction: Vec<MoveStatistics>,
    current: Option<TrialReaction>,
}

struct TrialReaction {
    reaction: usize,
    forward: bool,
    lnk: f64,
    /// Bonded energy of deleted molecules minus that of inserted ones; fed
    /// back through `bias` so intramolecular bonds do not skew equilibria.
    bond_energy: f64,
}

impl SpeciationMove {
    pub fn new(reaction_count: usize, weight: f64) -> Self {
        Self {
            weight,
            statistics: MoveStatistics::default(),
            per_reaction: vec![MoveStatistics::default(); reaction_count],
            current: None,
        }
    }

    /// Per-reaction acceptance statistics, index-aligned with the topology's
    /// reaction table.
    pub fn reaction_statistics(&self) -> &[MoveStatistics] {
        &self.per_reaction
    }

    /// Both sides must have matter (or headroom) available before any slot
    /// is touched; a failed check leaves the trial state untouched.
    fn feasible(
        &self,
        context: &MoveContext,
        reaction: &ReactionData,
        forward: bool,
    ) -> Result<bool, SimulationError> {
        for &(molecule, count) in reaction.deletions(forward) {
            let kind = &context.trial.topology.molecules[molecule];
            if kind.atomic {
                let group = self.single_group(context, reaction, molecule)?;
                if context.trial.groups[group].len() < count {
                    return Ok(false);
                }
            } else {
                let active = context
                    .trial
                    .find_molecules(molecule, GroupSelection::Active)
                    .count();
                if active < count {
                    return Ok(false);
                }
            }
        }
        for &(molecule, count) in reaction.additions(forward) {
            let kind = &context.trial.topology.molecules[molecule];
            if kind.atomic {
                let group = self.single_group(context, reaction, molecule)?;
                let group = &context.trial.groups[group];
                if group.len() + count > group.capacity() {
                    return Ok(false);
                }
            } else {
                let inactive = context
                    .trial
                    .find_molecules(molecule, GroupSelection::Inactive)
                    .count();
                if inactive < count {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Atomic kinds must map to exactly one group; anything else is a
    /// topology bug, not an unlucky draw.
    fn single_group(
        &self,
        context: &MoveContext,
        reaction: &ReactionData,
        molecule: usize,
    ) -> Result<usize, SimulationError> {
        let mut groups = context.trial.find_molecules(molecule, GroupSelection::All);
        match (groups.next(), groups.next()) {
            (Some(index), None) => Ok(index),
            _ => Err(SimulationError::BadReaction {
                reaction: reaction.name.clone(),
                reason: format!(
                    "atomic molecule '{}' must own exactly one group",
                    context.trial.topology.molecules[molecule].name
                ),
            }),
        }
    }
}

impl Move for SpeciationMove {
    fn name(&self) -> &str {
        "rcmc"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn propose(
        &mut self,
        context: &mut MoveContext,
        change: &mut Change,
    ) -> Result<(), SimulationError> {
        self.current = None;
        let topology = context.trial.topology.clone();
        if topology.reactions.is_empty() {
            return Err(SimulationError::Internal(
                "speciation move configured without reactions".into(),
            ));
        }
        let reaction_index = context.rng.gen_range(0..topology.reactions.len());
        let reaction = &topology.reactions[reaction_index];
        let forward: bool = context.rng.gen();

        if reaction.canonic {
            let fill = context.trial.reservoirs[reaction_index];
            if fill < 0 {
                return Err(SimulationError::ReservoirUnderflow(reaction.name.clone()));
            }
            // the consuming direction needs matter left in the reservoir
            if forward && fill == 0 {
                return Ok(());
            }
        }
        if !self.feasible(context, reaction, forward)? {
            trace!(reaction = %reaction.name, forward, "speciation draw infeasible");
            return Ok(());
        }

        let mut bond_energy = 0.0;

        if let Some((outgoing, incoming)) = reaction.swap_pair(forward) {
            // in-place identity change of one random active atom
            let candidates: Vec<usize> = context.trial.find_atoms(outgoing).collect();
            if candidates.is_empty() {
                return Ok(());
            }
            let slot = candidates[context.rng.gen_range(0..candidates.len())];
            let group_index = context
                .trial
                .group_containing(slot)
                .expect("active slot belongs to a group");
            let kind = &topology.atoms[incoming];
            let particle = &mut context.trial.particles[slot];
            particle.id = incoming;
            particle.charge = kind.charge;
            particle.shape = kind.dipole_moment.map(|mulen| Shape::Dipole {
                mu: match &particle.shape {
                    Some(Shape::Dipole { mu, .. }) => *mu,
                    _ => Point::new(1.0, 0.0, 0.0),
                },
                mulen,
            });

            let relative = context.trial.groups[group_index].relative(slot);
            change.groups.push(GroupChange {
                group_index,
                internal: true,
                dn_swap: true,
                atoms: vec![relative],
                ..Default::default()
            });
        }

        for &(molecule, count) in reaction.deletions(forward) {
            let kind = &topology.molecules[molecule];
            if kind.atomic {
                let group_index = self.single_group(context, reaction, molecule)?;
                let mut entry = GroupChange {
                    group_index,
                    internal: true,
                    dn_atomic: true,
                    ..Default::default()
                };
                for _ in 0..count {
                    let len = context.trial.groups[group_index].len();
                    let pick = context.rng.gen_range(0..len);
                    let last = len - 1;
                    if pick != last {
                        let a = context.trial.groups[group_index].absolute(pick);
                        let b = context.trial.groups[group_index].absolute(last);
                        // identical relabeling in both spaces keeps the peer
                        // slot holding the same particle through the sync
                        context.trial.swap_particles(a, b);
                        context.peer.swap_particles(a, b);
                    }
                    entry.atoms.push(last);
                    context.trial.groups[group_index].deactivate(1);
                }
                entry.atoms.sort_unstable();
                change.groups.push(entry);
            } else {
                let mut active: Vec<usize> = context
                    .trial
                    .find_molecules(molecule, GroupSelection::Active)
                    .collect();
                for _ in 0..count {
                    let group_index = active.swap_remove(context.rng.gen_range(0..active.len()));
                    bond_energy += group_bond_energy(context.trial, group_index);
                    let len = context.trial.groups[group_index].len();
                    context.trial.groups[group_index].deactivate(len);
                    change.groups.push(GroupChange {
                        group_index,
                        all: true,
                        internal: true,
                        atoms: (0..context.trial.groups[group_index].capacity()).collect(),
                        ..Default::default()
                    });
                }
            }
        }

        for &(molecule, count) in reaction.additions(forward) {
            let kind = &topology.molecules[molecule];
            if kind.atomic {
                let group_index = self.single_group(context, reaction, molecule)?;
                let mut entry = GroupChange {
                    group_index,
                    internal: true,
                    dn_atomic: true,
                    ..Default::default()
                };
                for _ in 0..count {
                    context.trial.groups[group_index].activate(1);
                    let relative = context.trial.groups[group_index].len() - 1;
                    let slot = context.trial.groups[group_index].absolute(relative);
                    let atom_id = kind.atoms[relative % kind.atoms.len()];
                    let mut pos = Point::zeros();
                    context.trial.cell.random_pos(&mut pos, context.rng);
                    pos.component_mul_assign(&kind.insert_directions);
                    let particle = &mut context.trial.particles[slot];
                    particle.id = atom_id;
                    particle.charge = topology.atoms[atom_id].charge;
                    particle.pos = pos;
                    entry.atoms.push(relative);
                }
                entry.atoms.sort_unstable();
                change.groups.push(entry);
            } else {
                let mut inactive: Vec<usize> = context
                    .trial
                    .find_molecules(molecule, GroupSelection::Inactive)
                    .collect();
                for _ in 0..count {
                    let group_index = inactive.swap_remove(context.rng.gen_range(0..inactive.len()));
                    let capacity = context.trial.groups[group_index].capacity();
                    context.trial.groups[group_index].activate(capacity);
                    let old_cm = context.trial.groups[group_index]
                        .mass_center
                        .expect("inactive molecular group keeps its template mass center");
                    let mut cm = Point::zeros();
                    context.trial.cell.random_pos(&mut cm, context.rng);
                    cm.component_mul_assign(&kind.insert_directions);
                    context
                        .trial
                        .translate_group(group_index, &(cm - old_cm));
                    let quat = random_rotation(context.rng, PI);
                    context.trial.rotate_group(group_index, &quat);
                    bond_energy -= group_bond_energy(context.trial, group_index);
                    change.groups.push(GroupChange {
                        group_index,
                        all: true,
                        internal: true,
                        atoms: (0..capacity).collect(),
                        ..Default::default()
                    });
                    debug_assert!({
                        let stored = context.trial.groups[group_index].mass_center.unwrap();
                        let fresh = context.trial.mass_center_of(group_index).unwrap();
                        context.trial.cell.sqdist(&stored, &fresh) < 1e-9
                    });
                }
            }
        }

        change.matter_changed = true;
        change.sort();

        if reaction.canonic {
            context.trial.reservoirs[reaction_index] += if forward { -1 } else { 1 };
        }
        self.current = Some(TrialReaction {
            reaction: reaction_index,
            forward,
            lnk: reaction.lnk,
            bond_energy,
        });
        Ok(())
    }

    /// `∓lnK + Σ bonded`, matching the sign convention of the ideal term:
    /// forward runs downhill in lnK.
    fn bias(&self, _change: &Change, _uold: f64, _unew: f64) -> f64 {
        match &self.current {
            Some(trial) if trial.forward => -trial.lnk + trial.bond_energy,
            Some(trial) => trial.lnk + trial.bond_energy,
            None => 0.0,
        }
    }

    fn accept(&mut self, _change: &Change) {
        self.statistics.record(true);
        if let Some(trial) = &self.current {
            self.per_reaction[trial.reaction].record(true);
        }
    }

    fn reject(&mut self, _change: &Change) {
        self.statistics.record(false);
        if let Some(trial) = &self.current {
            self.per_reaction[trial.reaction].record(false);
        }
    }

    fn statistics(&self) -> MoveStatistics {
        self.statistics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Cell;
    use crate::core::group::Group;
    use crate::core::particle::Particle;
    use crate::core::space::testutil::atom_kind;
    use crate::core::space::Space;
    use crate::core::topology::{
        Bond, BondKind, Conformation, MoleculeKind, ReactionData, Topology,
    };
    use crate::moves::MoveRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn atomic_kind(name: &str, id: usize, atom: usize) -> MoleculeKind {
        MoleculeKind {
            name: name.into(),
            id,
            atomic: true,
            atoms: vec![atom],
            bonds: vec![],
            conformations: vec![],
            insert_directions: Point::new(1.0, 1.0, 1.0),
        }
    }

    fn push_reservoir(space: &mut Space, molecule: usize, atom: usize, capacity: usize, active: usize) {
        let begin = space.particles.len();
        for i in 0..capacity {
            let mut p = Particle::new(atom, Point::new(begin as f64 + i as f64 * 0.7, 0.0, 0.0));
            space.cell.boundary(&mut p.pos);
            space.particles.push(p);
        }
        let mut group = Group::new(molecule, true, begin, capacity);
        group.deactivate(capacity - active);
        space.groups.push(group);
    }

    /// A ⇌ B + C over three atomic reservoirs; B and C start empty so only
    /// the forward direction can produce a non-empty change.
    fn dissociation_space(canonic: bool, reservoir: i64) -> Space {
        let topology = Topology {
            atoms: vec![atom_kind("A", 1.0), atom_kind("B", 1.0), atom_kind("C", 1.0)],
            molecules: vec![
                atomic_kind("A", 0, 0),
                atomic_kind("B", 1, 1),
                atomic_kind("C", 2, 2),
            ],
            reactions: vec![ReactionData {
                name: "A = B + C".into(),
                lnk: 0.0,
                canonic,
                reservoir,
                swap: false,
                reactants: vec![(0, 1)],
                products: vec![(1, 1), (2, 1)],
                swap_atoms: None,
            }],
        };
        let mut space = Space::new(Cell::cube(20.0).unwrap(), Arc::new(topology));
        push_reservoir(&mut space, 0, 0, 6, 4);
        push_reservoir(&mut space, 1, 1, 6, 0);
        push_reservoir(&mut space, 2, 2, 6, 0);
        space
    }

    fn spaces_identical(a: &Space, b: &Space) -> bool {
        a.particles == b.particles && a.groups == b.groups && a.reservoirs == b.reservoirs
    }

    #[test]
    fn forward_dissociation_transfers_matter_between_reservoirs() {
        let mut rng = MoveRng::seed_from_u64(40);
        let mut mv = SpeciationMove::new(1, 1.0);
        let mut produced = false;
        for _ in 0..50 {
            let accepted = dissociation_space(false, 0);
            let mut trial = accepted.clone();
            let mut peer = accepted.clone();
            let mut change = Change::default();
            let mut context = MoveContext {
                trial: &mut trial,
                peer: &mut peer,
                rng: &mut rng,
            };
            mv.propose(&mut context, &mut change).unwrap();
            if change.is_empty() {
                continue; // backward draw, infeasible by construction
            }
            produced = true;
            assert!(change.matter_changed);
            assert!(change.is_sorted());
            assert_eq!(trial.groups[0].len(), 3);
            assert_eq!(trial.groups[1].len(), 1);
            assert_eq!(trial.groups[2].len(), 1);
            // every newly activated atom sits inside the cell
            for group in [1, 2] {
                for slot in trial.groups[group].active_range() {
                    assert!(!trial.cell.collision(&trial.particles[slot].pos));
                }
            }
        }
        assert!(produced, "no forward draw in 50 attempts");
    }

    #[test]
    fn rejection_sync_restores_the_trial_state_bit_for_bit() {
        let mut rng = MoveRng::seed_from_u64(41);
        let mut mv = SpeciationMove::new(1, 1.0);
        for _ in 0..50 {
            let mut accepted = dissociation_space(false, 0);
            let mut trial = accepted.clone();
            let mut change = Change::default();
            let mut context = MoveContext {
                trial: &mut trial,
                peer: &mut accepted,
                rng: &mut rng,
            };
            mv.propose(&mut context, &mut change).unwrap();
            if change.is_empty() {
                continue;
            }
            trial.sync(&accepted, &change);
            assert!(
                spaces_identical(&trial, &accepted),
                "trial differs from accepted after rejection sync"
            );
        }
    }

    #[test]
    fn acceptance_sync_reproduces_the_trial_state_bit_for_bit() {
        let mut rng = MoveRng::seed_from_u64(42);
        let mut mv = SpeciationMove::new(1, 1.0);
        for _ in 0..50 {
            let mut accepted = dissociation_space(false, 0);
            let mut trial = accepted.clone();
            let mut change = Change::default();
            let mut context = MoveContext {
                trial: &mut trial,
                peer: &mut accepted,
                rng: &mut rng,
            };
            mv.propose(&mut context, &mut change).unwrap();
            if change.is_empty() {
                continue;
            }
            accepted.sync(&trial, &change);
            assert!(
                spaces_identical(&accepted, &trial),
                "accepted differs from trial after acceptance sync"
            );
        }
    }

    #[test]
    fn deletion_mirror_keeps_the_doomed_particle_visible_to_the_peer() {
        let mut rng = MoveRng::seed_from_u64(43);
        let mut mv = SpeciationMove::new(1, 1.0);
        for _ in 0..50 {
            let mut accepted = dissociation_space(false, 0);
            let mut trial = accepted.clone();
            let mut change = Change::default();
            let mut context = MoveContext {
                trial: &mut trial,
                peer: &mut accepted,
                rng: &mut rng,
            };
            mv.propose(&mut context, &mut change).unwrap();
            if change.is_empty() {
                continue;
            }
            // the deactivated slot must hold the same particle in both
            // spaces, so the peer's restricted energy sees the removal
            let entry = change
                .groups
                .iter()
                .find(|entry| entry.group_index == 0)
                .expect("reservoir A entry");
            for &relative in &entry.atoms {
                let slot = accepted.groups[0].absolute(relative);
                assert_eq!(accepted.particles[slot], trial.particles[slot]);
                assert!(accepted.groups[0].contains_active(slot));
                assert!(!trial.groups[0].contains_active(slot));
            }
        }
    }

    #[test]
    fn exhausted_canonic_reservoir_blocks_the_consuming_direction() {
        let mut rng = MoveRng::seed_from_u64(44);
        let mut mv = SpeciationMove::new(1, 1.0);
        for _ in 0..50 {
            let accepted = dissociation_space(true, 0);
            let mut trial = accepted.clone();
            let mut peer = accepted.clone();
            let mut change = Change::default();
            let mut context = MoveContext {
                trial: &mut trial,
                peer: &mut peer,
                rng: &mut rng,
            };
            mv.propose(&mut context, &mut change).unwrap();
            assert!(change.is_empty());
            assert!(spaces_identical(&trial, &accepted));
        }
    }

    #[test]
    fn canonic_reservoir_fill_moves_with_the_reaction_direction() {
        let mut rng = MoveRng::seed_from_u64(45);
        let mut mv = SpeciationMove::new(1, 1.0);
        for _ in 0..50 {
            let accepted = dissociation_space(true, 10);
            let mut trial = accepted.clone();
            let mut peer = accepted.clone();
            let mut change = Change::default();
            let mut context = MoveContext {
                trial: &mut trial,
                peer: &mut peer,
                rng: &mut rng,
            };
            mv.propose(&mut context, &mut change).unwrap();
            if change.is_empty() {
                continue;
            }
            assert_eq!(trial.reservoirs[0], 9);
            assert_eq!(peer.reservoirs[0], 10, "peer fill moves only on sync");
        }
    }

    #[test]
    fn swap_reaction_changes_identity_in_place() {
        let topology = Topology {
            atoms: vec![atom_kind("HA", 1.0), charged_atom_kind("A-", -1.0)],
            molecules: vec![atomic_kind("sites", 0, 0)],
            reactions: vec![ReactionData {
                name: "HA = A-".into(),
                lnk: -2.3,
                canonic: false,
                reservoir: 0,
                swap: true,
                reactants: vec![],
                products: vec![],
                swap_atoms: Some((0, 1)),
            }],
        };
        let mut accepted = Space::new(Cell::cube(20.0).unwrap(), Arc::new(topology));
        push_reservoir(&mut accepted, 0, 0, 3, 3);

        let mut rng = MoveRng::seed_from_u64(46);
        let mut mv = SpeciationMove::new(1, 1.0);
        let mut saw_forward = false;
        for _ in 0..50 {
            let mut trial = accepted.clone();
            let mut peer = accepted.clone();
            let mut change = Change::default();
            let mut context = MoveContext {
                trial: &mut trial,
                peer: &mut peer,
                rng: &mut rng,
            };
            mv.propose(&mut context, &mut change).unwrap();
            if change.is_empty() {
                continue; // backward draw finds no A- to protonate
            }
            saw_forward = true;
            let entry = &change.groups[0];
            assert!(entry.dn_swap && entry.internal);
            assert_eq!(entry.atoms.len(), 1);
            let slot = trial.groups[0].absolute(entry.atoms[0]);
            assert_eq!(trial.particles[slot].id, 1);
            assert_eq!(trial.particles[slot].charge, -1.0);
            assert_eq!(trial.particles[slot].pos, accepted.particles[slot].pos);
            assert!((mv.bias(&change, 0.0, 0.0) - 2.3).abs() < 1e-12);
        }
        assert!(saw_forward);
    }

    fn charged_atom_kind(name: &str, charge: f64) -> crate::core::topology::AtomKind {
        let mut kind = atom_kind(name, 1.0);
        kind.charge = charge;
        kind
    }

    /// dimer ⇌ B with a stretched harmonic bond: the disappearing bond
    /// energy must surface in the bias.
    #[test]
    fn molecular_deletion_prices_its_bond_energy_into_the_bias() {
        let topology = Topology {
            atoms: vec![atom_kind("bead", 1.0), atom_kind("B", 1.0)],
            molecules: vec![
                MoleculeKind {
                    name: "dimer".into(),
                    id: 0,
                    atomic: false,
                    atoms: vec![0, 0],
                    bonds: vec![Bond {
                        kind: BondKind::Harmonic { k: 10.0, req: 2.0 },
                        index: [0, 1],
                    }],
                    conformations: vec![Conformation {
                        weight: 1.0,
                        positions: vec![Point::new(-1.0, 0.0, 0.0), Point::new(1.0, 0.0, 0.0)],
                    }],
                    insert_directions: Point::new(1.0, 1.0, 1.0),
                },
                atomic_kind("B", 1, 1),
            ],
            reactions: vec![ReactionData {
                name: "dimer = B".into(),
                lnk: 0.5,
                canonic: false,
                reservoir: 0,
                swap: false,
                reactants: vec![(0, 1)],
                products: vec![(1, 1)],
                swap_atoms: None,
            }],
        };
        let mut accepted = Space::new(Cell::cube(20.0).unwrap(), Arc::new(topology));
        accepted.particles.push(Particle::new(0, Point::zeros()));
        accepted.particles.push(Particle::new(0, Point::zeros()));
        accepted.groups.push(Group::new(0, false, 0, 2));
        accepted.place_conformation(0, 0, &Point::zeros());
        // stretch the bond to 3 Å: energy 5 kT
        accepted.particles[1].pos = Point::new(2.0, 0.0, 0.0);
        accepted.update_mass_center(0);
        push_reservoir(&mut accepted, 1, 1, 4, 0);

        let mut rng = MoveRng::seed_from_u64(47);
        let mut mv = SpeciationMove::new(1, 1.0);
        let mut saw_forward = false;
        for _ in 0..50 {
            let mut trial = accepted.clone();
            let mut peer = accepted.clone();
            let mut change = Change::default();
            let mut context = MoveContext {
                trial: &mut trial,
                peer: &mut peer,
                rng: &mut rng,
            };
            mv.propose(&mut context, &mut change).unwrap();
            if change.is_empty() {
                continue; // backward: no B to delete
            }
            saw_forward = true;
            assert!(trial.groups[0].is_empty());
            assert_eq!(trial.groups[1].len(), 1);
            // bias = -lnK + bond energy of the deleted dimer
            assert!((mv.bias(&change, 0.0, 0.0) - (-0.5 + 5.0)).abs() < 1e-9);
        }
        assert!(saw_forward);
    }
}
