pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod simulator;

pub use config::SimulatorConfig;
pub use error::{CreateRunError, CreateRunResult};
pub use models::{LogLevel, RunStatus};
