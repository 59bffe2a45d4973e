use super::{changed_slots, EnergyTerm};
use crate::core::change::Change;
use crate::core::particle::Particle;
use crate::core::space::Space;
use crate::core::topology::AtomKind;
use rayon::prelude::*;

/// Isotropic two-body potential between atom kinds, in kT.
pub trait PairPotential: Send + Sync {
    fn energy(&self, a: &Particle, ka: &AtomKind, b: &Particle, kb: &AtomKind, sqdist: f64) -> f64;
    fn box_clone(&self) -> Box<dyn PairPotential>;
}

impl Clone for Box<dyn PairPotential> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Lennard-Jones 12-6 with Lorentz-Berthelot mixing of the atom-table
/// sigma/epsilon values.
#[derive(Debug, Clone, Copy, Default)]
pub struct LennardJones;

impl PairPotential for LennardJones {
    #[inline]
    fn energy(&self, _a: &Particle, ka: &AtomKind, _b: &Particle, kb: &AtomKind, sqdist: f64) -> f64 {
        let sigma = 0.5 * (ka.sigma + kb.sigma);
        let epsilon = (ka.epsilon * kb.epsilon).sqrt();
        if epsilon == 0.0 {
            return 0.0;
        }
        let s2 = sigma * sigma / sqdist;
        let s6 = s2 * s2 * s2;
        4.0 * epsilon * (s6 * s6 - s6)
    }

    fn box_clone(&self) -> Box<dyn PairPotential> {
        Box::new(*self)
    }
}

/// Bare Coulomb interaction scaled by the Bjerrum length, `lB q₁ q₂ / r`.
#[derive(Debug, Clone, Copy)]
pub struct Coulomb {
    pub bjerrum: f64,
}

impl PairPotential for Coulomb {
    #[inline]
    fn energy(&self, a: &Particle, _ka: &AtomKind, b: &Particle, _kb: &AtomKind, sqdist: f64) -> f64 {
        if a.charge == 0.0 || b.charge == 0.0 {
            return 0.0;
        }
        self.bjerrum * a.charge * b.charge / sqdist.sqrt()
    }

    fn box_clone(&self) -> Box<dyn PairPotential> {
        Box::new(*self)
    }
}

/// Hard-sphere overlap: +∞ inside the contact distance, zero outside.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardSphere;

impl PairPotential for HardSphere {
    #[inline]
    fn energy(&self, _a: &Particle, ka: &AtomKind, _b: &Particle, kb: &AtomKind, sqdist: f64) -> f64 {
        let contact = 0.5 * (ka.sigma + kb.sigma);
        if sqdist < contact * contact {
            f64::INFINITY
        } else {
            0.0
        }
    }

    fn box_clone(&self) -> Box<dyn PairPotential> {
        Box::new(*self)
    }
}

/// Change-driven sum of pair interactions.
///
/// Pairs inside the same molecular group are never counted; the internal
/// geometry of rigid molecules is the bonded term's business. Pairs inside
/// the same atomic group are real reservoir interactions and always count.
/// This rule is applied identically in the global and the restricted sums,
/// which keeps the energy bookkeeping drift-free.
#[derive(Clone)]
pub struct Nonbonded {
    potentials: Vec<Box<dyn PairPotential>>,
    /// Squared cutoff radius; `None` sums all minimum-image pairs.
    cutoff_squared: Option<f64>,
}

impl Nonbonded {
    pub fn new(potentials: Vec<Box<dyn PairPotential>>, cutoff: Option<f64>) -> Self {
        Self {
            potentials,
            cutoff_squared: cutoff.map(|rc| rc * rc),
        }
    }

    #[inline]
    fn pair(&self, space: &Space, i: usize, j: usize) -> f64 {
        let a = &space.particles[i];
        let b = &space.particles[j];
        let sqdist = space.cell.sqdist(&a.pos, &b.pos);
        if let Some(rc2) = self.cutoff_squared {
            if sqdist > rc2 {
                return 0.0;
            }
        }
        let ka = &space.topology.atoms[a.id];
        let kb = &space.topology.atoms[b.id];
        self.potentials
            .iter()
            .map(|p| p.energy(a, ka, b, kb, sqdist))
            .sum()
    }

    /// Global sum over all active pairs. The outer loop parallelizes over
    /// slots; this is the only parallel region in the crate, confined to a
    /// single energy call.
    fn global(&self, space: &Space) -> f64 {
        let slots: Vec<(usize, usize)> = space
            .groups
            .iter()
            .enumerate()
            .flat_map(|(gi, g)| g.active_range().map(move |slot| (slot, gi)))
            .collect();
        slots
            .par_iter()
            .enumerate()
            .map(|(n, &(i, gi))| {
                let mut sum = 0.0;
                for &(j, gj) in &slots[n + 1..] {
                    if gi == gj && !space.groups[gi].atomic {
                        continue;
                    }
                    sum += self.pair(space, i, j);
                    if sum == f64::INFINITY {
                        break;
                    }
                }
                sum
            })
            .sum()
    }

    /// Sum of every pair with at least one member in the change window.
    fn restricted(&self, space: &Space, change: &Change) -> f64 {
        let moved = changed_slots(space, change);
        let mut sum = 0.0;
        for &(i, gi) in &moved {
            for (gj, group) in space.groups.iter().enumerate() {
                if gj == gi && !group.atomic {
                    continue;
                }
                for j in group.active_range() {
                    if j == i {
                        continue;
                    }
                    // moved-moved pairs count once, from the lower slot
                    if j < i && moved.binary_search_by_key(&j, |&(slot, _)| slot).is_ok() {
                        continue;
                    }
                    sum += self.pair(space, i, j);
                    if sum == f64::INFINITY {
                        return sum;
                    }
                }
            }
        }
        sum
    }
}

impl EnergyTerm for Nonbonded {
    fn name(&self) -> &'static str {
        "nonbonded"
    }

    fn energy(&self, space: &Space, change: &Change) -> f64 {
        if change.is_empty() {
            0.0
        } else if change.everything || change.volume_changed {
            self.global(space)
        } else {
            self.restricted(space, change)
        }
    }

    /// Intra-group pair sum; nonzero only for atomic reservoirs.
    fn group_internal(&self, space: &Space, group_index: usize) -> f64 {
        let group = &space.groups[group_index];
        if !group.atomic {
            return 0.0;
        }
        let mut sum = 0.0;
        let range = group.active_range();
        for i in range.clone() {
            for j in i + 1..range.end {
                sum += self.pair(space, i, j);
                if sum == f64::INFINITY {
                    return sum;
                }
            }
        }
        sum
    }

    fn box_clone(&self) -> Box<dyn EnergyTerm> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::change::GroupChange;
    use crate::core::space::testutil::small_space;
    use crate::Point;

    fn lj_term() -> Nonbonded {
        Nonbonded::new(vec![Box::new(LennardJones)], None)
    }

    #[test]
    fn lennard_jones_minimum_is_at_sigma_times_sixth_root_of_two() {
        let space = small_space();
        let ka = &space.topology.atoms[0];
        let rmin = ka.sigma * 2.0_f64.powf(1.0 / 6.0);
        let u = LennardJones.energy(
            &space.particles[0],
            ka,
            &space.particles[1],
            ka,
            rmin * rmin,
        );
        assert!((u - (-ka.epsilon)).abs() < 1e-12);
    }

    #[test]
    fn coulomb_pair_follows_bjerrum_scaling() {
        let space = small_space();
        let mut a = space.particles[0].clone();
        let mut b = space.particles[1].clone();
        a.charge = 1.0;
        b.charge = -1.0;
        let ka = &space.topology.atoms[0];
        let u = Coulomb { bjerrum: 7.0 }.energy(&a, ka, &b, ka, 4.0);
        assert!((u - (-3.5)).abs() < 1e-12);
    }

    #[test]
    fn hard_sphere_rejects_overlap_with_infinity() {
        let space = small_space();
        let ka = &space.topology.atoms[0]; // sigma 4
        let a = &space.particles[0];
        let b = &space.particles[1];
        assert_eq!(HardSphere.energy(a, ka, b, ka, 15.9), f64::INFINITY);
        assert_eq!(HardSphere.energy(a, ka, b, ka, 16.1), 0.0);
    }

    #[test]
    fn restricted_sum_of_disjoint_changes_totals_the_global_delta() {
        // move one reservoir atom and compare restricted deltas to full sums
        let term = lj_term();
        let accepted = small_space();
        let mut trial = accepted.clone();
        trial.particles[1].pos += Point::new(0.4, 0.3, -0.2);

        let change = Change::single_group(GroupChange {
            group_index: 0,
            atoms: vec![1],
            ..Default::default()
        });

        let du_restricted = term.energy(&trial, &change) - term.energy(&accepted, &change);
        let du_global = term.global(&trial) - term.global(&accepted);
        assert!(
            (du_restricted - du_global).abs() < 1e-9,
            "restricted {} vs global {}",
            du_restricted,
            du_global
        );
    }

    #[test]
    fn whole_group_change_matches_global_delta() {
        let term = lj_term();
        let accepted = small_space();
        let mut trial = accepted.clone();
        trial.translate_group(1, &Point::new(0.7, -0.1, 0.9));

        let change = Change::single_group(GroupChange {
            group_index: 1,
            all: true,
            ..Default::default()
        });

        let du_restricted = term.energy(&trial, &change) - term.energy(&accepted, &change);
        let du_global = term.global(&trial) - term.global(&accepted);
        assert!((du_restricted - du_global).abs() < 1e-9);
    }

    #[test]
    fn moved_pairs_are_not_double_counted() {
        let term = lj_term();
        let mut space = small_space();
        // park two active reservoir atoms close together far from the rest
        space.particles[0].pos = Point::new(8.0, 8.0, 8.0);
        space.particles[1].pos = Point::new(8.0, 8.0, 8.0 + 4.49);

        let change = Change::single_group(GroupChange {
            group_index: 0,
            atoms: vec![0, 1],
            ..Default::default()
        });
        let both = term.energy(&space, &change);

        let single = Change::single_group(GroupChange {
            group_index: 0,
            atoms: vec![0],
            ..Default::default()
        });
        let one_side = term.energy(&space, &single);

        // the 0-1 pair must appear exactly once in the two-atom change
        let pair = term.pair(&space, 0, 1);
        let cross: f64 = [2, 4, 5, 6, 7, 8, 9]
            .iter()
            .map(|&j| term.pair(&space, 1, j))
            .sum();
        assert!((both - (one_side + cross)).abs() < 1e-9);
        assert!(pair.abs() > 1e-6, "test setup: pair should be nonzero");
    }

    #[test]
    fn intra_molecular_pairs_are_excluded_everywhere() {
        let term = lj_term();
        let space = small_space();
        assert_eq!(term.group_internal(&space, 1), 0.0);
        // a single isolated trimer contributes nothing to the global sum
        let mut lonely = space.clone();
        lonely.groups[0].deactivate(3);
        lonely.groups[2].deactivate(3);
        assert_eq!(term.global(&lonely), 0.0);
    }

    #[test]
    fn reservoir_internal_energy_counts_active_pairs_only() {
        let term = lj_term();
        let space = small_space();
        let expected: f64 = [(0, 1), (0, 2), (1, 2)]
            .iter()
            .map(|&(i, j)| term.pair(&space, i, j))
            .sum();
        assert!((term.group_internal(&space, 0) - expected).abs() < 1e-12);
    }

    #[test]
    fn cutoff_silences_distant_pairs() {
        // closest pair sits at 1 Å, safely beyond a 0.5 Å cutoff
        let term = Nonbonded::new(vec![Box::new(LennardJones)], Some(0.5));
        let space = small_space();
        assert_eq!(term.global(&space), 0.0);
    }
}
