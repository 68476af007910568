//! AMP Simulation Engine
//!
//! Tick-driven simulator comparing two CPU dispatch policies under a
//! fork-bomb workload: round robin, and a budgeted market with throttling
//! and bankruptcy.

pub mod types;
pub mod ledger;
pub mod config;
pub mod error;
pub mod policies;
pub mod workloads;
pub mod metrics;
pub mod simulator;
pub mod scenario;
pub mod output;

pub use error::{Result, SimError};
