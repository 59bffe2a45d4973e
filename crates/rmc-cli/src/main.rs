mod cli;
mod commands;
mod error;
mod logging;

use clap::Parser;
use cli::{Cli, Commands};
use tracing::error;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.clone()) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    let result = match &cli.command {
        Commands::Run(args) => commands::run(args),
        Commands::Check(args) => commands::check(args),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }
}
