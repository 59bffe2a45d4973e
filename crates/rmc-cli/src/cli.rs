use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const ABOUT: &str = "RMC - a reactive Monte Carlo engine for molecular and coarse-grained \
simulation in the canonical, isobaric, grand-canonical, and reactive ensembles.";
const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = ABOUT,
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a simulation from a TOML input document.
    Run(RunArgs),
    /// Parse and validate an input document without running it.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the simulation input in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Write the final state here; `.json` selects the textual encoding,
    /// anything else the canonical binary one.
    #[arg(short, long, value_name = "PATH")]
    pub state: Option<PathBuf>,

    /// Include the RNG state in the saved state for bitwise-reproducible
    /// resumption.
    #[arg(long)]
    pub saverandom: bool,

    /// Relative energy-drift tolerance checked after every macro cycle.
    #[arg(long, value_name = "FLOAT", default_value_t = 1e-4)]
    pub drift_tolerance: f64,

    /// Hide the progress bar.
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the simulation input in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli_parsing() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn run_args_parse_with_overrides() {
        let cli = Cli::parse_from([
            "rmc",
            "run",
            "-i",
            "salt.toml",
            "-s",
            "final.json",
            "--saverandom",
            "--drift-tolerance",
            "1e-6",
            "-vv",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.input, PathBuf::from("salt.toml"));
                assert_eq!(args.state, Some(PathBuf::from("final.json")));
                assert!(args.saverandom);
                assert_eq!(args.drift_tolerance, 1e-6);
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        let result = Cli::try_parse_from(["rmc", "check", "-i", "x.toml", "-q", "-v"]);
        assert!(result.is_err());
    }
}
