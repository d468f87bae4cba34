//! Common test utilities and helpers

#![allow(dead_code)]

use phase_handoff::{AlternationPolicy, DriverConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Driver settings with short naps so runs produce many handoffs quickly
pub fn fast_driver_config(
    phase_a_workers: usize,
    phase_b_workers: usize,
    run_duration: Duration,
) -> DriverConfig {
    DriverConfig {
        run_duration,
        phase_a_workers,
        phase_b_workers,
        phase_a_interval: Duration::from_millis(5),
        phase_b_interval: Duration::from_millis(5),
        exit_timeout: Duration::from_millis(500),
        policy: AlternationPolicy::Permissive,
    }
}

/// Seeded random enter pattern (true = phase A)
pub fn enter_pattern(seed: u64, len: usize) -> Vec<bool> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen::<bool>()).collect()
}
