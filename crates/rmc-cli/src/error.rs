use rmc_core::config::ConfigError;
use rmc_core::io::StateIoError;
use rmc_core::mc::SimulationError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    #[error("State file error: {0}")]
    State(#[from] StateIoError),
}

impl CliError {
    /// Process exit code: configuration problems and runtime consistency
    /// failures get distinct codes for scripting.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Simulation(_) => 3,
            CliError::State(_) | CliError::Io(_) => 4,
        }
    }
}
