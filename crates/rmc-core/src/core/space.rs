use super::change::Change;
use super::geometry::{Cell, GeometryError, VolumeScalePolicy};
use super::group::Group;
use super::particle::Particle;
use super::topology::Topology;
use crate::Point;
use nalgebra::UnitQuaternion;
use std::sync::Arc;

/// Group activity filter for [`Space::find_molecules`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSelection {
    /// Groups with at least one active particle.
    Active,
    /// Fully deactivated groups.
    Inactive,
    /// Everything.
    All,
}

/// Owns the particle vector and the group index for one replica state.
///
/// Two instances exist per simulation (accepted and trial); they are kept
/// bit-identical outside the window of the last [`Change`] through
/// [`Space::sync`], which is the single entry point for state transfer.
#[derive(Debug, Clone)]
pub struct Space {
    pub cell: Cell,
    pub particles: Vec<Particle>,
    pub groups: Vec<Group>,
    pub topology: Arc<Topology>,
    /// Per-reaction canonic reservoir fill; mutated by the speciation move on
    /// the trial state and transferred on sync like any other matter change.
    pub reservoirs: Vec<i64>,
}

impl Space {
    pub fn new(cell: Cell, topology: Arc<Topology>) -> Self {
        let reservoirs = topology.reactions.iter().map(|r| r.reservoir).collect();
        Self {
            cell,
            particles: Vec::new(),
            groups: Vec::new(),
            topology,
            reservoirs,
        }
    }

    /// Indices of groups with the given molecule kind, filtered by activity.
    ///
    /// Atomic groups count as active when any atom is active; use the group's
    /// own headroom for finer checks.
    pub fn find_molecules(
        &self,
        molecule: usize,
        selection: GroupSelection,
    ) -> impl Iterator<Item = usize> + '_ {
        self.groups
            .iter()
            .enumerate()
            .filter(move |(_, g)| g.molecule == molecule)
            .filter(move |(_, g)| match selection {
                GroupSelection::Active => !g.is_empty(),
                GroupSelection::Inactive => g.is_empty(),
                GroupSelection::All => true,
            })
            .map(|(index, _)| index)
    }

    /// Absolute slots of all *active* particles with the given atom kind.
    pub fn find_atoms(&self, atom_id: usize) -> impl Iterator<Item = usize> + '_ {
        self.groups
            .iter()
            .flat_map(|g| g.active_range())
            .filter(move |&slot| self.particles[slot].id == atom_id)
    }

    /// Group owning the given particle slot; binary search over the
    /// contiguous group windows.
    pub fn group_containing(&self, slot: usize) -> Option<usize> {
        let index = self.groups.partition_point(|g| g.begin() <= slot);
        index
            .checked_sub(1)
            .filter(|&i| self.groups[i].full_range().contains(&slot))
    }

    /// Absolute slots of every active particle, in group order.
    pub fn active_slots(&self) -> Vec<usize> {
        self.groups.iter().flat_map(|g| g.active_range()).collect()
    }

    /// Total number of active particles.
    pub fn active_len(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum()
    }

    /// Number of active molecules (or atoms, for atomic kinds) of a kind.
    pub fn count_active(&self, molecule: usize) -> usize {
        let atomic = self.topology.molecules[molecule].atomic;
        self.groups
            .iter()
            .filter(|g| g.molecule == molecule)
            .map(|g| if atomic { g.len() } else { usize::from(!g.is_empty()) })
            .sum()
    }

    /// Mass-weighted center of the active particles of a group, computed
    /// under periodic boundaries relative to the first active particle.
    pub fn mass_center_of(&self, group_index: usize) -> Option<Point> {
        let group = &self.groups[group_index];
        let first = group.active_range().next()?;
        let reference = self.particles[first].pos;
        let mut weighted = Point::zeros();
        let mut total_mass = 0.0;
        for slot in group.active_range() {
            let particle = &self.particles[slot];
            let mass = self.topology.atoms[particle.id].mass;
            weighted += mass * self.cell.vdist(&particle.pos, &reference);
            total_mass += mass;
        }
        let mut cm = reference + weighted / total_mass;
        self.cell.boundary(&mut cm);
        Some(cm)
    }

    /// Refresh the stored mass center of a molecular group.
    pub fn update_mass_center(&mut self, group_index: usize) {
        if !self.groups[group_index].atomic {
            self.groups[group_index].mass_center = self.mass_center_of(group_index);
        }
    }

    /// Translate every active particle of a group and its mass center,
    /// wrapping back into the cell.
    pub fn translate_group(&mut self, group_index: usize, displacement: &Point) {
        let range = self.groups[group_index].active_range();
        for slot in range {
            self.particles[slot].pos += displacement;
            self.cell.boundary(&mut self.particles[slot].pos);
        }
        if let Some(cm) = &mut self.groups[group_index].mass_center {
            *cm += displacement;
            self.cell.boundary(cm);
        }
    }

    /// Rotate the active particles of a group about its mass center.
    /// Particle shape payloads rotate along.
    pub fn rotate_group(&mut self, group_index: usize, quat: &UnitQuaternion<f64>) {
        let rot = quat.to_rotation_matrix().into_inner();
        let cm = self.groups[group_index]
            .mass_center
            .expect("rotation requires a mass center");
        let range = self.groups[group_index].active_range();
        for slot in range {
            let shifted = self.cell.vdist(&self.particles[slot].pos, &cm);
            let mut pos = cm + quat * shifted;
            self.cell.boundary(&mut pos);
            self.particles[slot].pos = pos;
            self.particles[slot].rotate(quat, &rot);
        }
    }

    /// Overwrite a group's particles from a conformation template, placing
    /// the template mass center at `cm`. Ids and charges are restamped from
    /// the molecule kind, so this is also the activation path for insertions.
    pub fn place_conformation(&mut self, group_index: usize, conformation: usize, cm: &Point) {
        let group = &self.groups[group_index];
        let kind = &self.topology.molecules[group.molecule];
        let template = &kind.conformations[conformation];

        // template mass center
        let mut weighted = Point::zeros();
        let mut total_mass = 0.0;
        for (position, &atom_id) in template.positions.iter().zip(&kind.atoms) {
            let mass = self.topology.atoms[atom_id].mass;
            weighted += mass * position;
            total_mass += mass;
        }
        let template_cm = weighted / total_mass;

        let begin = group.begin();
        let positions = template.positions.clone();
        let atoms = kind.atoms.clone();
        for (offset, (position, atom_id)) in positions.iter().zip(atoms).enumerate() {
            let particle = &mut self.particles[begin + offset];
            particle.id = atom_id;
            particle.charge = self.topology.atoms[atom_id].charge;
            let mut pos = cm + (position - template_cm);
            self.cell.boundary(&mut pos);
            particle.pos = pos;
        }
        let group = &mut self.groups[group_index];
        group.conformation = conformation;
        group.mass_center = Some(*cm);
    }

    /// Swap the contents of two particle slots. Physically a relabeling; the
    /// speciation move applies the same swap to both spaces so that their
    /// layouts stay aligned.
    pub fn swap_particles(&mut self, a: usize, b: usize) {
        self.particles.swap(a, b);
    }

    /// Rescale the cell to `new_volume` and move the particles with it:
    /// molecular groups translate rigidly with their mass centers, atomic
    /// group members rescale individually.
    pub fn scale_volume(
        &mut self,
        new_volume: f64,
        policy: VolumeScalePolicy,
    ) -> Result<(), GeometryError> {
        let scale = self.cell.scale_volume(new_volume, policy)?;
        for index in 0..self.groups.len() {
            if self.groups[index].atomic {
                for slot in self.groups[index].active_range() {
                    self.particles[slot].pos.component_mul_assign(&scale);
                    self.cell.boundary(&mut self.particles[slot].pos);
                }
            } else if !self.groups[index].is_empty() {
                let cm = self.groups[index]
                    .mass_center
                    .expect("active molecular group carries a mass center");
                let displacement = cm.component_mul(&scale) - cm;
                self.translate_group(index, &displacement);
            }
        }
        Ok(())
    }

    /// Copy the slots described by `change` from `other` into `self`,
    /// restoring bit-identity outside the change window in O(|change|).
    ///
    /// The driver calls `accepted.sync(trial, change)` on accept and
    /// `trial.sync(accepted, change)` on reject.
    pub fn sync(&mut self, other: &Space, change: &Change) {
        debug_assert_eq!(self.particles.len(), other.particles.len());
        if change.volume_changed {
            self.cell = other.cell.clone();
        }
        if change.matter_changed {
            self.reservoirs.clone_from(&other.reservoirs);
        }
        if change.everything {
            self.particles.clone_from(&other.particles);
            self.groups.clone_from(&other.groups);
            return;
        }
        for entry in &change.groups {
            let index = entry.group_index;
            self.groups[index] = other.groups[index].clone();
            if entry.all {
                let range = other.groups[index].full_range();
                self.particles[range.clone()].clone_from_slice(&other.particles[range]);
            } else {
                for &relative in &entry.atoms {
                    let slot = other.groups[index].absolute(relative);
                    self.particles[slot] = other.particles[slot].clone();
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::core::topology::{AtomKind, Conformation, MoleculeKind};

    pub fn atom_kind(name: &str, mass: f64) -> AtomKind {
        AtomKind {
            name: name.into(),
            sigma: 4.0,
            epsilon: 0.1,
            mass,
            charge: 0.0,
            dipole_moment: None,
            implicit: false,
        }
    }

    /// One atomic reservoir kind ("ion") and one rigid three-bead molecular
    /// kind ("trimer") with a linear template along x.
    pub fn two_kind_topology() -> Topology {
        Topology {
            atoms: vec![atom_kind("ion", 1.0), atom_kind("bead", 2.0)],
            molecules: vec![
                MoleculeKind {
                    name: "ion".into(),
                    id: 0,
                    atomic: true,
                    atoms: vec![0],
                    bonds: vec![],
                    conformations: vec![],
                    insert_directions: Point::new(1.0, 1.0, 1.0),
                },
                MoleculeKind {
                    name: "trimer".into(),
                    id: 1,
                    atomic: false,
                    atoms: vec![1, 1, 1],
                    bonds: vec![],
                    conformations: vec![Conformation {
                        weight: 1.0,
                        positions: vec![
                            Point::new(-1.0, 0.0, 0.0),
                            Point::new(0.0, 0.0, 0.0),
                            Point::new(1.0, 0.0, 0.0),
                        ],
                    }],
                    insert_directions: Point::new(1.0, 1.0, 1.0),
                },
            ],
            reactions: vec![],
        }
    }

    /// Space with one 4-slot ion reservoir (3 active) and two trimers.
    pub fn small_space() -> Space {
        let topology = Arc::new(two_kind_topology());
        let mut space = Space::new(Cell::cube(20.0).unwrap(), topology);

        let mut reservoir = Group::new(0, true, 0, 4);
        reservoir.deactivate(1);
        for i in 0..4 {
            space
                .particles
                .push(Particle::new(0, Point::new(i as f64, 0.0, 0.0)));
        }
        space.groups.push(reservoir);

        for g in 0..2 {
            let begin = space.particles.len();
            for _ in 0..3 {
                space.particles.push(Particle::new(1, Point::zeros()));
            }
            space.groups.push(Group::new(1, false, begin, 3));
            let index = space.groups.len() - 1;
            let cm = Point::new(5.0 * (g as f64 + 1.0), 2.0, 0.0);
            space.place_conformation(index, 0, &cm);
        }
        space
    }
}
