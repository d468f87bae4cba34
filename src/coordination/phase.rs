//! Phase values and the alternation policy

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two mutually exclusive phases tracked by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    /// Phase A is active ("on")
    A,

    /// Phase B is active ("off"); the coordinator starts here
    #[default]
    B,
}

impl Phase {
    /// The opposite phase
    pub fn other(&self) -> Phase {
        match self {
            Phase::A => Phase::B,
            Phase::B => Phase::A,
        }
    }

    /// Whether this phase counts as "on"
    pub fn is_on(&self) -> bool {
        matches!(self, Phase::A)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::A => write!(f, "A"),
            Phase::B => write!(f, "B"),
        }
    }
}

/// How the coordinator treats an enter call for the phase already active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlternationPolicy {
    /// Redundant entries are accepted and still broadcast
    #[default]
    Permissive,

    /// Redundant entries are refused with `AlreadyInPhase`
    Strict,
}

impl AlternationPolicy {
    /// Check if entering `next` from `current` is allowed
    pub fn permits(&self, current: Phase, next: Phase) -> bool {
        match self {
            AlternationPolicy::Permissive => true,
            AlternationPolicy::Strict => current != next,
        }
    }
}

impl fmt::Display for AlternationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlternationPolicy::Permissive => write!(f, "permissive"),
            AlternationPolicy::Strict => write!(f, "strict"),
        }
    }
}
