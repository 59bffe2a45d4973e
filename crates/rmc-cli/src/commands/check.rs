use crate::cli::CheckArgs;
use crate::error::Result;
use rmc_core::config::{build, InputConfig};

pub fn check(args: &CheckArgs) -> Result<()> {
    let config = InputConfig::from_file(&args.input)?;
    let simulation = build(&config)?;
    let space = simulation.chain.accepted_space();
    println!(
        "{}: OK ({} particles in {} groups, {} reactions, {} macro x {} micro)",
        args.input.display(),
        space.particles.len(),
        space.groups.len(),
        space.topology.reactions.len(),
        simulation.macro_cycles,
        simulation.micro_sweeps,
    );
    Ok(())
}
