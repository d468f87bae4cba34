//! Phase Workers
//!
//! Two symmetric roles drive the coordinator:
//! - **PhaseAWorker**: naps, enters phase A, then waits for phase B
//! - **PhaseBWorker**: waits for phase A, naps, then enters phase B
//!
//! Both loops observe a `CancellationToken` at every suspension point and
//! return a `WorkerReport` when they exit through cancellation. Any other
//! error is returned as `Err`.

use crate::coordination::{HandoffState, Phase};
use crate::error::{HandoffError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Which side of the handoff a worker drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    /// Enters phase A, waits for B
    PhaseA,

    /// Waits for A, enters phase B
    PhaseB,
}

/// Worker identity, unique within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId {
    pub role: WorkerRole,
    pub index: usize,
}

impl WorkerId {
    pub fn new(role: WorkerRole, index: usize) -> Self {
        Self { role, index }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            WorkerRole::PhaseA => write!(f, "phase-a-{}", self.index),
            WorkerRole::PhaseB => write!(f, "phase-b-{}", self.index),
        }
    }
}

/// How a worker left its loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerExit {
    /// Exited through a cancellation request
    Cancelled,
}

/// Exit report returned by a worker loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    /// Worker identity
    pub id: WorkerId,

    /// Completed loop iterations
    pub cycles: u64,

    /// Exit path
    pub exit: WorkerExit,
}

impl WorkerReport {
    fn cancelled(id: WorkerId, cycles: u64) -> Self {
        Self {
            id,
            cycles,
            exit: WorkerExit::Cancelled,
        }
    }
}

/// Sleep for `interval` unless cancelled first
async fn nap(interval: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Err(HandoffError::Cancelled),
        _ = tokio::time::sleep(interval) => Ok(()),
    }
}

/// Repeatedly run `cycle` until it reports cancellation
async fn drive<F, Fut>(
    id: WorkerId,
    cancel: &CancellationToken,
    mut cycle: F,
) -> Result<WorkerReport>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let mut cycles = 0u64;

    while !cancel.is_cancelled() {
        match cycle().await {
            Ok(()) => cycles += 1,
            Err(HandoffError::Cancelled) => break,
            Err(e) => {
                warn!(worker = %id, "Worker loop failed: {}", e);
                return Err(e);
            }
        }
    }

    info!(worker = %id, cycles, "Exiting via cancellation");
    debug!(worker = %id, "Worker ending");
    Ok(WorkerReport::cancelled(id, cycles))
}

/// Worker that asserts phase A and waits for someone else to enter phase B
pub struct PhaseAWorker {
    id: WorkerId,
    state: Arc<HandoffState>,
    interval: Duration,
    cancel: CancellationToken,
}

impl PhaseAWorker {
    /// Create a new phase-A worker
    ///
    /// # Arguments
    ///
    /// * `index` - Position among phase-A workers, used in the worker id
    /// * `state` - Shared coordinator
    /// * `interval` - Nap before each entry into phase A
    /// * `cancel` - Token that ends the loop
    pub fn new(
        index: usize,
        state: Arc<HandoffState>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: WorkerId::new(WorkerRole::PhaseA, index),
            state,
            interval,
            cancel,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Run until cancelled
    pub async fn run(self) -> Result<WorkerReport> {
        drive(self.id, &self.cancel, || self.cycle()).await
    }

    async fn cycle(&self) -> Result<()> {
        debug!(worker = %self.id, phase = %self.state.current_phase()?, "Worker on");
        nap(self.interval, &self.cancel).await?;

        match self.state.enter_phase_a() {
            Ok(event) => info!(
                worker = %self.id,
                seq = event.seq,
                changed = event.changed,
                "Entered phase A"
            ),
            Err(HandoffError::AlreadyInPhase(_)) => {
                debug!(worker = %self.id, "Phase A already entered by another worker");
            }
            Err(e) => return Err(e),
        }

        self.state.wait_for_phase_b(&self.cancel).await?;
        Ok(())
    }
}

/// Worker that waits for phase A and then hands back to phase B
pub struct PhaseBWorker {
    id: WorkerId,
    state: Arc<HandoffState>,
    interval: Duration,
    cancel: CancellationToken,
}

impl PhaseBWorker {
    /// Create a new phase-B worker
    ///
    /// # Arguments
    ///
    /// * `index` - Position among phase-B workers, used in the worker id
    /// * `state` - Shared coordinator
    /// * `interval` - Nap between observing phase A and entering phase B
    /// * `cancel` - Token that ends the loop
    pub fn new(
        index: usize,
        state: Arc<HandoffState>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id: WorkerId::new(WorkerRole::PhaseB, index),
            state,
            interval,
            cancel,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Run until cancelled
    pub async fn run(self) -> Result<WorkerReport> {
        drive(self.id, &self.cancel, || self.cycle()).await
    }

    async fn cycle(&self) -> Result<()> {
        let released = self.state.wait_for_phase_a(&self.cancel).await?;
        debug!(worker = %self.id, phase = %released.phase, seq = released.entries, "Worker off");

        nap(self.interval, &self.cancel).await?;

        match self.state.enter_phase_b() {
            Ok(event) => info!(
                worker = %self.id,
                seq = event.seq,
                changed = event.changed,
                "Entered phase B"
            ),
            Err(HandoffError::AlreadyInPhase(Phase::B)) => {
                debug!(worker = %self.id, "Phase B already entered by another worker");
            }
            Err(e) => return Err(e),
        }

        Ok(())
    }
}
