use crate::analysis::Analysis;
use crate::core::space::Space;
use crate::energy::Hamiltonian;
use crate::mc::SimulationError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Textual XYZ snapshots of the active particles, one frame per sample.
pub struct XyzTrajectory {
    interval: u64,
    writer: BufWriter<File>,
}

impl XyzTrajectory {
    pub fn create(path: &Path, interval: u64) -> std::io::Result<Self> {
        Ok(Self {
            interval,
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl Analysis for XyzTrajectory {
    fn name(&self) -> &'static str {
        "xyzfile"
    }

    fn interval(&self) -> u64 {
        self.interval
    }

    fn sample(
        &mut self,
        space: &Space,
        _hamiltonian: &Hamiltonian,
        step: u64,
    ) -> Result<(), SimulationError> {
        let write = |writer: &mut BufWriter<File>| -> std::io::Result<()> {
            let sides = space.cell.side_lengths();
            writeln!(writer, "{}", space.active_len())?;
            writeln!(
                writer,
                "step {} box {:.6} {:.6} {:.6}",
                step, sides.x, sides.y, sides.z
            )?;
            for &slot in &space.active_slots() {
                let particle = &space.particles[slot];
                let name = &space.topology.atoms[particle.id].name;
                writeln!(
                    writer,
                    "{} {:.6} {:.6} {:.6}",
                    name, particle.pos.x, particle.pos.y, particle.pos.z
                )?;
            }
            writer.flush()
        };
        write(&mut self.writer).map_err(|source| SimulationError::AnalysisIo {
            analysis: "xyzfile",
            source,
        })
    }
}

/// One line per frame with alternating charge and radius per slot, *all*
/// slots including inactive ones (written as zeros). Companion stream to a
/// position trajectory for postprocessing charge fluctuations.
pub struct ChargeRadiusTrajectory {
    interval: u64,
    writer: BufWriter<File>,
}

impl ChargeRadiusTrajectory {
    pub fn create(path: &Path, interval: u64) -> std::io::Result<Self> {
        Ok(Self {
            interval,
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl Analysis for ChargeRadiusTrajectory {
    fn name(&self) -> &'static str {
        "qrfile"
    }

    fn interval(&self) -> u64 {
        self.interval
    }

    fn sample(
        &mut self,
        space: &Space,
        _hamiltonian: &Hamiltonian,
        _step: u64,
    ) -> Result<(), SimulationError> {
        let write = |writer: &mut BufWriter<File>| -> std::io::Result<()> {
            let mut fields = Vec::with_capacity(2 * space.particles.len());
            for group in &space.groups {
                for slot in group.full_range() {
                    if group.contains_active(slot) {
                        let particle = &space.particles[slot];
                        let radius = 0.5 * space.topology.atoms[particle.id].sigma;
                        fields.push(format!("{:.4} {:.4}", particle.charge, radius));
                    } else {
                        fields.push("0 0".to_string());
                    }
                }
            }
            writeln!(writer, "{}", fields.join(" "))?;
            writer.flush()
        };
        write(&mut self.writer).map_err(|source| SimulationError::AnalysisIo {
            analysis: "qrfile",
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::space::testutil::small_space;

    #[test]
    fn xyz_frames_carry_active_particles_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traj.xyz");
        let space = small_space();
        let hamiltonian = Hamiltonian::new();

        let mut traj = XyzTrajectory::create(&path, 1).unwrap();
        traj.sample(&space, &hamiltonian, 0).unwrap();
        drop(traj);

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "9"); // 3 ions + 2 trimers
        assert!(lines.next().unwrap().starts_with("step 0 box"));
        assert_eq!(content.lines().count(), 11);
    }

    #[test]
    fn charge_radius_lines_cover_every_slot_with_zeros_for_inactive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("traj.qr");
        let space = small_space();
        let hamiltonian = Hamiltonian::new();

        let mut traj = ChargeRadiusTrajectory::create(&path, 1).unwrap();
        traj.sample(&space, &hamiltonian, 0).unwrap();
        traj.sample(&space, &hamiltonian, 1).unwrap();
        drop(traj);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        let fields: Vec<&str> = content.lines().next().unwrap().split(' ').collect();
        assert_eq!(fields.len(), 2 * space.particles.len());
        // slot 3 is the inactive reservoir tail
        assert_eq!(fields[6], "0");
        assert_eq!(fields[7], "0");
    }
}
