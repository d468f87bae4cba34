//! Phase Handoff - Two-Phase Mutual-Exclusion Handoff
//!
//! A monitor-style coordinator shared by cooperating async workers:
//! - One lock-protected phase (A or B) with broadcast wakeups
//! - Waits that re-check their predicate under the lock after every wake
//! - Cooperative cancellation that can interrupt blocked waits
//! - A driver that runs workers for a bounded time and collects exit reports
//!
//! # Architecture
//!
//! - **Coordination**: `HandoffState`, phases, events, alternation policy
//! - **Worker**: phase-A and phase-B worker loops
//! - **Driver**: bounded run, cancellation, exit report collection
//! - **Config**: layered TOML/environment configuration
//!
//! # Example
//!
//! ```ignore
//! use phase_handoff::{Driver, DriverConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let summary = Driver::new(DriverConfig::default()).run().await?;
//!
//!     assert!(summary.all_cancelled());
//!     println!("{} handoff(s)", summary.completed_handoffs());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coordination;
pub mod driver;
pub mod error;
pub mod worker;

// Re-export commonly used types
pub use config::HandoffConfig;
pub use coordination::{AlternationPolicy, HandoffSnapshot, HandoffState, Phase, PhaseEvent};
pub use driver::{Driver, DriverConfig, RunSummary};
pub use error::{HandoffError, Result};
pub use worker::{PhaseAWorker, PhaseBWorker, WorkerExit, WorkerId, WorkerReport, WorkerRole};
