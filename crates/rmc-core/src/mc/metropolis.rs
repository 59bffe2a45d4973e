use crate::core::change::Change;
use crate::core::space::Space;
use rand::Rng;

/// Metropolis acceptance test in kT units. NaN (e.g. ∞ − ∞ from two
/// overlapping states) is conservatively rejected.
pub fn metropolis(delta_u: f64, rng: &mut impl Rng) -> bool {
    if delta_u.is_nan() {
        return false;
    }
    delta_u <= 0.0 || rng.gen::<f64>() < (-delta_u).exp()
}

/// Ideal-gas contribution of a particle-count change.
///
/// For every species whose active count changed between the accepted and the
/// trial state this adds `ln(N_new!/N_old!) − ΔN ln V`, which is what lets
/// insertion and deletion moves equilibrate to the configured activity: a
/// single insertion contributes `ln(N_new/V)`, a single deletion `ln(V/N_old)`.
///
/// Swap entries change two atom-kind counts at fixed total, handled through
/// the particle ids on either side of the change.
pub fn ideal_term(new: &Space, old: &Space, change: &Change) -> f64 {
    if !change.matter_changed {
        return 0.0;
    }
    let volume = new.cell.volume();
    let mut seen_molecules: Vec<usize> = Vec::new();
    let mut seen_atoms: Vec<usize> = Vec::new();
    let mut du = 0.0;

    for entry in &change.groups {
        let group_new = &new.groups[entry.group_index];
        let group_old = &old.groups[entry.group_index];

        if entry.dn_swap {
            for &relative in &entry.atoms {
                let slot = group_new.absolute(relative);
                for id in [new.particles[slot].id, old.particles[slot].id] {
                    if seen_atoms.contains(&id) {
                        continue;
                    }
                    seen_atoms.push(id);
                    let n_new = new.find_atoms(id).count();
                    let n_old = old.find_atoms(id).count();
                    du += count_term(n_new, n_old, volume);
                }
            }
        } else if group_new.len() != group_old.len() {
            let molecule = group_new.molecule;
            if seen_molecules.contains(&molecule) {
                continue;
            }
            seen_molecules.push(molecule);
            let n_new = new.count_active(molecule);
            let n_old = old.count_active(molecule);
            du += count_term(n_new, n_old, volume);
        }
    }
    du
}

/// `ln(N_new!/N_old!) − (N_new − N_old) ln V` by walking the factorial ratio.
fn count_term(n_new: usize, n_old: usize, volume: f64) -> f64 {
    let mut du = 0.0;
    if n_new > n_old {
        for n in n_old + 1..=n_new {
            du += (n as f64).ln();
        }
    } else {
        for n in n_new + 1..=n_old {
            du -= (n as f64).ln();
        }
    }
    du - (n_new as f64 - n_old as f64) * volume.ln()
}
