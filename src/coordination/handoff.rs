//! Handoff coordination between phase-A and phase-B workers
//!
//! Monitor built from a `std::sync::Mutex` guarding the phase and a
//! `tokio::sync::Notify` used as the condition primitive. Enter operations
//! broadcast to every waiter; waiters re-test their predicate under the lock
//! after each wake, so the phase (not the wake) decides when a wait returns.

use super::events::{HandoffSnapshot, PhaseEvent};
use super::phase::{AlternationPolicy, Phase};
use crate::error::{HandoffError, Result};
use chrono::Utc;
use std::sync::{Mutex, MutexGuard, TryLockError};
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Buffered events per subscriber before it starts lagging
const EVENT_CAPACITY: usize = 1024;

/// Lock-protected part of the coordinator
#[derive(Debug, Default)]
struct PhaseCell {
    phase: Phase,
    entries: u64,
    transitions: u64,
    rejected: u64,
}

impl PhaseCell {
    fn snapshot(&self) -> HandoffSnapshot {
        HandoffSnapshot {
            phase: self.phase,
            entries: self.entries,
            transitions: self.transitions,
            rejected: self.rejected,
        }
    }
}

/// Shared two-phase coordinator
///
/// Create one per run and hand it to each worker behind an `Arc`.
pub struct HandoffState {
    /// Phase and counters
    cell: Mutex<PhaseCell>,

    /// Broadcast wakeup for parked waiters
    wakeup: Notify,

    /// Event stream of accepted enter calls
    events: broadcast::Sender<PhaseEvent>,

    /// Treatment of redundant enter calls
    policy: AlternationPolicy,
}

impl HandoffState {
    /// Create a permissive coordinator starting in phase B
    pub fn new() -> Self {
        Self::with_policy(AlternationPolicy::default())
    }

    /// Create a coordinator with the given policy, starting in phase B
    pub fn with_policy(policy: AlternationPolicy) -> Self {
        Self::starting_in(Phase::default(), policy)
    }

    /// Create a coordinator with an explicit initial phase
    pub fn starting_in(phase: Phase, policy: AlternationPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            cell: Mutex::new(PhaseCell {
                phase,
                ..PhaseCell::default()
            }),
            wakeup: Notify::new(),
            events,
            policy,
        }
    }

    /// Alternation policy fixed at construction
    pub fn policy(&self) -> AlternationPolicy {
        self.policy
    }

    fn lock(&self) -> Result<MutexGuard<'_, PhaseCell>> {
        self.cell.lock().map_err(|_| HandoffError::LockPoisoned)
    }

    /// Enter phase A and wake every waiter
    pub fn enter_phase_a(&self) -> Result<PhaseEvent> {
        self.enter(Phase::A)
    }

    /// Enter phase B and wake every waiter
    pub fn enter_phase_b(&self) -> Result<PhaseEvent> {
        self.enter(Phase::B)
    }

    fn enter(&self, next: Phase) -> Result<PhaseEvent> {
        let mut cell = self.lock()?;

        if !self.policy.permits(cell.phase, next) {
            cell.rejected += 1;
            debug!("Refused redundant entry into phase {}", next);
            return Err(HandoffError::AlreadyInPhase(next));
        }

        let changed = cell.phase != next;
        cell.phase = next;
        cell.entries += 1;
        if changed {
            cell.transitions += 1;
        }

        let event = PhaseEvent {
            seq: cell.entries,
            phase: next,
            changed,
            at: Utc::now(),
        };

        // Sending fails only when nobody is subscribed
        let _ = self.events.send(event.clone());
        self.wakeup.notify_waiters();

        trace!(seq = event.seq, changed, "Entered phase {}", next);
        Ok(event)
    }

    /// Suspend until phase A is active
    ///
    /// Returns the snapshot read under the lock at release time; its
    /// `entries` is the sequence number of the write that satisfied the
    /// wait. Returns `HandoffError::Cancelled` if `cancel` fires first.
    pub async fn wait_for_phase_a(&self, cancel: &CancellationToken) -> Result<HandoffSnapshot> {
        self.wait_for(Phase::A, cancel).await
    }

    /// Suspend until phase B is active
    ///
    /// See [`HandoffState::wait_for_phase_a`].
    pub async fn wait_for_phase_b(&self, cancel: &CancellationToken) -> Result<HandoffSnapshot> {
        self.wait_for(Phase::B, cancel).await
    }

    async fn wait_for(&self, target: Phase, cancel: &CancellationToken) -> Result<HandoffSnapshot> {
        loop {
            let notified = self.wakeup.notified();
            tokio::pin!(notified);
            // Register before testing so a broadcast between test and park is not lost
            notified.as_mut().enable();

            {
                let cell = self.lock()?;
                if cell.phase == target {
                    return Ok(cell.snapshot());
                }
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("Wait for phase {} cancelled", target);
                    return Err(HandoffError::Cancelled);
                }

                _ = &mut notified => {
                    trace!("Woken while waiting for phase {}, re-checking", target);
                }
            }
        }
    }

    /// Read the active phase under the lock (diagnostics only)
    pub fn current_phase(&self) -> Result<Phase> {
        Ok(self.lock()?.phase)
    }

    /// Read the active phase without blocking
    ///
    /// Returns `None` while another party holds the lock.
    pub fn try_current_phase(&self) -> Option<Phase> {
        match self.cell.try_lock() {
            Ok(cell) => Some(cell.phase),
            Err(TryLockError::WouldBlock) | Err(TryLockError::Poisoned(_)) => None,
        }
    }

    /// Phase and counters, read atomically
    pub fn snapshot(&self) -> Result<HandoffSnapshot> {
        Ok(self.lock()?.snapshot())
    }

    /// Subscribe to events of enter calls accepted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PhaseEvent> {
        self.events.subscribe()
    }
}

impl Default for HandoffState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    #[test]
    fn test_starts_in_phase_b() {
        let state = HandoffState::new();
        assert_eq!(state.current_phase().unwrap(), Phase::B);
        assert_eq!(state.policy(), AlternationPolicy::Permissive);
        assert_eq!(state.snapshot().unwrap(), HandoffSnapshot::default());
    }

    #[test]
    fn test_redundant_enter_is_idempotent() {
        let state = HandoffState::new();

        let first = state.enter_phase_a().unwrap();
        let second = state.enter_phase_a().unwrap();

        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(second.seq, 2);
        assert_eq!(state.current_phase().unwrap(), Phase::A);

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.entries, 2);
        assert_eq!(snapshot.transitions, 1);
        assert_eq!(snapshot.rejected, 0);
    }

    #[test]
    fn test_strict_refuses_redundant_enter() {
        let state = HandoffState::with_policy(AlternationPolicy::Strict);

        let err = state.enter_phase_b().unwrap_err();
        assert!(matches!(err, HandoffError::AlreadyInPhase(Phase::B)));

        state.enter_phase_a().unwrap();
        let err = state.enter_phase_a().unwrap_err();
        assert!(matches!(err, HandoffError::AlreadyInPhase(Phase::A)));

        let snapshot = state.snapshot().unwrap();
        assert_eq!(snapshot.phase, Phase::A);
        assert_eq!(snapshot.entries, 1);
        assert_eq!(snapshot.rejected, 2);
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_phase_active() {
        let state = HandoffState::starting_in(Phase::A, AlternationPolicy::Permissive);
        let cancel = CancellationToken::new();

        let released = timeout(Duration::from_millis(100), state.wait_for_phase_a(&cancel))
            .await
            .expect("wait should not block")
            .unwrap();

        assert_eq!(released.phase, Phase::A);
        assert_eq!(released.entries, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_released_by_enter() {
        let state = Arc::new(HandoffState::new());
        let cancel = CancellationToken::new();

        let waiter = {
            let state = state.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { state.wait_for_phase_a(&cancel).await })
        };

        sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        let entered = state.enter_phase_a().unwrap();

        let released = timeout(Duration::from_millis(500), waiter)
            .await
            .expect("waiter should be released")
            .unwrap()
            .unwrap();
        assert_eq!(released.phase, Phase::A);
        assert_eq!(released.entries, entered.seq);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wrong_phase_broadcast_does_not_release() {
        let state = Arc::new(HandoffState::starting_in(
            Phase::A,
            AlternationPolicy::Permissive,
        ));
        let cancel = CancellationToken::new();

        let waiter = {
            let state = state.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { state.wait_for_phase_b(&cancel).await })
        };

        sleep(Duration::from_millis(20)).await;

        // Broadcasts for the phase the waiter is not interested in
        for _ in 0..5 {
            state.enter_phase_a().unwrap();
        }
        sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        let entered = state.enter_phase_b().unwrap();
        let released = timeout(Duration::from_millis(500), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(released.phase, Phase::B);
        assert_eq!(released.entries, entered.seq);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_blocked_wait() {
        let state = Arc::new(HandoffState::new());
        let cancel = CancellationToken::new();

        let waiter = {
            let state = state.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { state.wait_for_phase_a(&cancel).await })
        };

        sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = timeout(Duration::from_millis(200), waiter)
            .await
            .expect("cancelled wait should unwind")
            .unwrap();
        assert!(matches!(result, Err(HandoffError::Cancelled)));

        // Lock is free right after the unwind
        assert_eq!(state.try_current_phase(), Some(Phase::B));
    }

    #[test]
    fn test_poisoned_lock_reported() {
        let state = Arc::new(HandoffState::new());

        let poisoner = state.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.cell.lock().unwrap();
            panic!("poison the coordinator lock");
        })
        .join();

        assert!(matches!(state.enter_phase_a(), Err(HandoffError::LockPoisoned)));
        assert!(matches!(state.current_phase(), Err(HandoffError::LockPoisoned)));
        assert_eq!(state.try_current_phase(), None);
    }

    #[tokio::test]
    async fn test_events_follow_write_order() {
        let state = HandoffState::new();
        let mut rx = state.subscribe();

        state.enter_phase_a().unwrap();
        state.enter_phase_b().unwrap();
        state.enter_phase_b().unwrap();

        let events: Vec<PhaseEvent> = (0..3).map(|_| rx.try_recv().unwrap()).collect();
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(events[1].phase, Phase::B);
        assert!(events[1].changed);
        assert!(!events[2].changed);
    }
}
