//! Coordination module for the two-phase handoff
//!
//! Provides a monitor-style coordinator shared by cooperating workers:
//! 1. A phase-A worker enters phase A and broadcasts
//! 2. Phase-B workers waiting for A re-check the phase and proceed
//! 3. A phase-B worker enters phase B and broadcasts
//! 4. Phase-A workers waiting for B re-check the phase and proceed

mod events;
mod handoff;
mod phase;

pub use events::{count_handoffs, strictly_alternates, HandoffSnapshot, PhaseEvent};
pub use handoff::HandoffState;
pub use phase::{AlternationPolicy, Phase};
