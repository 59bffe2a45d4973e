//! State checkpointing and trajectory output.

mod state;
mod trajectory;

pub use state::{StateFile, StateIoError};
pub use trajectory::{ChargeRadiusTrajectory, XyzTrajectory};
