pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use config::Cli;
pub use server::run_server;
pub use state::AppState;
