//! Command-line interface handlers

pub mod commands;
pub mod simulation;

pub use commands::*;
pub use simulation::{simulate, SimulationOptions, DEMO_ADDRESSES};
