//! Deterministic stress harness for the scheduler
//!
//! Drives a scheduler with seeded random commands and seeded fault
//! injection, then audits the outcome ledger against the collaborator's
//! call counters.

pub mod simulator;

pub use simulator::{
    run_simulator, CountingApi, SimulatorConfig, SimulatorReport, SimulatorStats, Violation,
};
