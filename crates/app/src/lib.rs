//! Checkout simulation driver for the `storefront` binary.

pub mod simulation;

pub use simulation::{SimulationPlan, SimulationReport, run};
