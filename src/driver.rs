//! Handoff Run Driver
//!
//! Starts the phase workers against one shared coordinator, lets them run
//! for a bounded duration, then cancels every worker and collects its exit
//! report.
//!
//! # Design
//!
//! - One root `CancellationToken`; each worker gets a child token
//! - Workers run on the multi-threaded runtime inside a `JoinSet`
//! - An event recorder task keeps the ordered log of phase entries
//! - Shutdown waits at most `exit_timeout`; stragglers are aborted

use crate::coordination::{
    count_handoffs, AlternationPolicy, HandoffSnapshot, HandoffState, PhaseEvent,
};
use crate::error::{HandoffError, Result};
use crate::worker::{PhaseAWorker, PhaseBWorker, WorkerExit, WorkerId, WorkerReport};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runtime settings for one driver run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Wall-clock time the workers run before cancellation
    pub run_duration: Duration,

    /// Number of phase-A workers
    pub phase_a_workers: usize,

    /// Number of phase-B workers
    pub phase_b_workers: usize,

    /// Nap before each phase-A entry
    pub phase_a_interval: Duration,

    /// Nap before each phase-B entry
    pub phase_b_interval: Duration,

    /// Maximum wait for exit reports after cancellation
    pub exit_timeout: Duration,

    /// Coordinator alternation policy
    pub policy: AlternationPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            run_duration: Duration::from_secs(3),
            phase_a_workers: 2,
            phase_b_workers: 1,
            phase_a_interval: Duration::from_millis(180),
            phase_b_interval: Duration::from_millis(200),
            exit_timeout: Duration::from_millis(500),
            policy: AlternationPolicy::Permissive,
        }
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Exit reports, in the order workers finished
    pub reports: Vec<WorkerReport>,

    /// Ordered log of accepted phase entries
    pub events: Vec<PhaseEvent>,

    /// Events the recorder missed because it lagged
    pub dropped_events: u64,

    /// Coordinator state after all workers exited
    pub snapshot: HandoffSnapshot,

    /// Time from start until cancellation was issued
    pub run_elapsed_ms: u64,

    /// Time from cancellation until the last exit report
    pub shutdown_elapsed_ms: u64,
}

impl RunSummary {
    /// Number of A -> B handoffs in the event log
    pub fn completed_handoffs(&self) -> usize {
        count_handoffs(&self.events)
    }

    /// Whether every worker exited through cancellation
    pub fn all_cancelled(&self) -> bool {
        self.reports
            .iter()
            .all(|report| report.exit == WorkerExit::Cancelled)
    }

    /// Report of a given worker
    pub fn report(&self, id: WorkerId) -> Option<&WorkerReport> {
        self.reports.iter().find(|report| report.id == id)
    }
}

/// Drives workers against one shared coordinator
pub struct Driver {
    config: DriverConfig,
    state: Arc<HandoffState>,
}

impl Driver {
    /// Create a driver with a fresh coordinator
    pub fn new(config: DriverConfig) -> Self {
        let state = Arc::new(HandoffState::with_policy(config.policy));
        Self { config, state }
    }

    /// Create a driver around an existing coordinator
    pub fn with_state(config: DriverConfig, state: Arc<HandoffState>) -> Self {
        Self { config, state }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Shared coordinator used by this driver's workers
    pub fn state(&self) -> Arc<HandoffState> {
        self.state.clone()
    }

    /// Run for the configured duration, then cancel and collect reports
    pub async fn run(&self) -> Result<RunSummary> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Like `run`, but also stops early when `stop` resolves
    pub async fn run_until<F>(&self, stop: F) -> Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let root = CancellationToken::new();
        let recorder_stop = CancellationToken::new();
        let recorder = spawn_recorder(self.state.subscribe(), recorder_stop.clone());

        info!(
            "Starting handoff run: {} phase-A worker(s), {} phase-B worker(s), {} policy, {:?}",
            self.config.phase_a_workers,
            self.config.phase_b_workers,
            self.state.policy(),
            self.config.run_duration
        );

        let mut workers = JoinSet::new();

        for index in 0..self.config.phase_b_workers {
            let worker = PhaseBWorker::new(
                index,
                self.state.clone(),
                self.config.phase_b_interval,
                root.child_token(),
            );
            let id = worker.id();
            workers.spawn(async move { (id, worker.run().await) });
        }

        for index in 0..self.config.phase_a_workers {
            let worker = PhaseAWorker::new(
                index,
                self.state.clone(),
                self.config.phase_a_interval,
                root.child_token(),
            );
            let id = worker.id();
            workers.spawn(async move { (id, worker.run().await) });
        }

        let started = Instant::now();
        tokio::select! {
            _ = tokio::time::sleep(self.config.run_duration) => {
                debug!("Run duration elapsed");
            }
            _ = stop => {
                info!("Stop requested before run duration elapsed");
            }
        }
        let run_elapsed = started.elapsed();

        info!("Cancelling {} worker(s)", workers.len());
        root.cancel();

        let shutdown_started = Instant::now();
        let collected = collect_reports(&mut workers, self.config.exit_timeout).await;
        let shutdown_elapsed = shutdown_started.elapsed();

        recorder_stop.cancel();
        let (events, dropped_events) = recorder
            .await
            .map_err(|e| HandoffError::Other(format!("Event recorder failed: {}", e)))?;

        let reports = collected?;
        let snapshot = self.state.snapshot()?;

        info!(
            "Run finished: {} entries, {} transitions, shutdown took {:?}",
            snapshot.entries, snapshot.transitions, shutdown_elapsed
        );

        Ok(RunSummary {
            reports,
            events,
            dropped_events,
            snapshot,
            run_elapsed_ms: run_elapsed.as_millis() as u64,
            shutdown_elapsed_ms: shutdown_elapsed.as_millis() as u64,
        })
    }
}

/// Wait for every worker's exit report, bounded by `exit_timeout`
async fn collect_reports(
    workers: &mut JoinSet<(WorkerId, Result<WorkerReport>)>,
    exit_timeout: Duration,
) -> Result<Vec<WorkerReport>> {
    let deadline = tokio::time::Instant::now() + exit_timeout;
    let mut reports = Vec::with_capacity(workers.len());

    loop {
        match tokio::time::timeout_at(deadline, workers.join_next()).await {
            Ok(None) => break,
            Ok(Some(Ok((_, Ok(report))))) => {
                debug!(worker = %report.id, cycles = report.cycles, "Collected exit report");
                reports.push(report);
            }
            Ok(Some(Ok((id, Err(e))))) => {
                workers.abort_all();
                return Err(HandoffError::Worker {
                    id: id.to_string(),
                    reason: e.to_string(),
                });
            }
            Ok(Some(Err(join_err))) => {
                workers.abort_all();
                return Err(HandoffError::Worker {
                    id: "unknown".to_string(),
                    reason: join_err.to_string(),
                });
            }
            Err(_) => {
                let pending = workers.len();
                warn!("{} worker(s) missed the exit deadline, aborting", pending);
                workers.abort_all();
                return Err(HandoffError::ShutdownTimeout { pending });
            }
        }
    }

    Ok(reports)
}

/// Record phase events until `stop` fires, then drain what is buffered
fn spawn_recorder(
    mut rx: broadcast::Receiver<PhaseEvent>,
    stop: CancellationToken,
) -> JoinHandle<(Vec<PhaseEvent>, u64)> {
    tokio::spawn(async move {
        let mut events = Vec::new();
        let mut dropped = 0u64;

        loop {
            tokio::select! {
                biased;

                received = rx.recv() => match received {
                    Ok(event) => events.push(event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Event recorder lagged, {} event(s) dropped", missed);
                        dropped += missed;
                    }
                    Err(RecvError::Closed) => break,
                },

                _ = stop.cancelled() => break,
            }
        }

        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(missed)) => dropped += missed,
                Err(_) => break,
            }
        }

        (events, dropped)
    })
}
