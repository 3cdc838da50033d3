//! Orchestrator: the simulation instance and everything around a run
//!
//! - **engine**: `Simulation` setup, run control and queries
//! - **execution**: event dispatch and trajectory stepping
//! - **config**: JSON-loadable static setup
//! - **report**: exported results and replication merge

pub mod config;
pub mod engine;
mod execution;
pub mod report;

pub use config::{ResourceConfig, SimulationConfig};
pub use engine::{Simulation, SimulationError};
pub use report::{merge_reports, MergedReport, Replicated, SimulationReport};
