//! Phase events and state snapshots
//!
//! Every accepted enter call produces one `PhaseEvent`. Events are published
//! while the coordinator lock is held, so their sequence numbers follow the
//! exact order in which the phase was written.

use super::phase::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of one accepted enter call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseEvent {
    /// Position in the coordinator's write order, starting at 1
    pub seq: u64,

    /// Phase that was entered
    pub phase: Phase,

    /// Whether the call actually changed the phase
    pub changed: bool,

    /// When the phase was written
    pub at: DateTime<Utc>,
}

/// Point-in-time view of the coordinator, read under its lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HandoffSnapshot {
    /// Currently active phase
    pub phase: Phase,

    /// Accepted enter calls
    pub entries: u64,

    /// Accepted enter calls that changed the phase
    pub transitions: u64,

    /// Enter calls refused by the strict policy
    pub rejected: u64,
}

/// Count A -> B changes in an ordered event log
pub fn count_handoffs(events: &[PhaseEvent]) -> usize {
    events
        .windows(2)
        .filter(|pair| pair[0].phase == Phase::A && pair[1].phase == Phase::B && pair[1].changed)
        .count()
}

/// Check that consecutive events never repeat a phase
pub fn strictly_alternates(events: &[PhaseEvent]) -> bool {
    events.windows(2).all(|pair| pair[0].phase != pair[1].phase)
}
