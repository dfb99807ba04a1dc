pub mod config;
pub mod runner;

pub use config::TurnConfig;
pub use runner::{run_turn, TurnError, TurnOutcome};
