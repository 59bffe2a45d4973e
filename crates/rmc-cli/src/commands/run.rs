use crate::cli::RunArgs;
use crate::error::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rmc_core::config::{build, InputConfig};
use rmc_core::io::StateFile;
use rmc_core::moves::Move;
use tracing::info;

pub fn run(args: &RunArgs) -> Result<()> {
    let config = InputConfig::from_file(&args.input)?;
    let mut simulation = build(&config)?;

    let progress = if args.no_progress {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(simulation.macro_cycles as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] cycle {pos}/{len} {msg}",
            )
            .expect("static template is valid")
            .progress_chars("=>-"),
        );
        bar
    };

    for _cycle in 0..simulation.macro_cycles {
        for _ in 0..simulation.micro_sweeps {
            simulation.chain.sweep()?;
            simulation.analyses.sample_all(
                simulation.chain.accepted_space(),
                simulation.chain.hamiltonian(),
                simulation.chain.steps(),
            )?;
        }
        simulation.chain.check_drift(args.drift_tolerance)?;
        progress.set_message(format!("U = {:.3} kT", simulation.chain.ledger_energy()));
        progress.inc(1);
    }
    progress.finish_and_clear();

    info!(
        steps = simulation.chain.steps(),
        drift = simulation.chain.energy_drift(),
        "run finished"
    );

    for mv in simulation.chain.propagator().moves() {
        println!(
            "{:<28} attempts {:>10}  acceptance {:>6.1}%",
            mv.name(),
            mv.statistics().attempts,
            100.0 * mv.statistics().acceptance_ratio()
        );
    }
    for report in simulation.analyses.reports() {
        println!("{}", report);
    }

    if let Some(path) = &args.state {
        let (space, rng) = simulation.chain.checkpoint();
        let rng = args.saverandom.then_some(rng);
        StateFile::from_simulation(space, simulation.chain.steps(), rng).save(path)?;
        info!(path = %path.display(), "state written");
    }
    Ok(())
}
