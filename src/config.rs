//! Configuration for handoff runs
//!
//! Values are layered with the `config` crate: built-in defaults, then an
//! optional TOML file, then `PHASE_HANDOFF__*` environment variables.
//!
//! # Configuration File Format
//!
//! TOML format in `phase-handoff.toml`:
//!
//! ```toml
//! [run]
//! duration_secs = 3
//! policy = "permissive"
//!
//! [workers]
//! phase_a_workers = 2
//! phase_b_workers = 1
//! phase_a_interval_ms = 180
//! phase_b_interval_ms = 200
//!
//! [shutdown]
//! exit_timeout_ms = 500
//! ```
//!
//! Environment overrides use `__` between sections, for example
//! `PHASE_HANDOFF__WORKERS__PHASE_A_WORKERS=4`.

use crate::coordination::AlternationPolicy;
use crate::driver::DriverConfig;
use crate::error::{HandoffError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variable overrides
pub const ENV_PREFIX: &str = "PHASE_HANDOFF";

/// Complete configuration for a handoff run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffConfig {
    /// Run length and policy
    #[serde(default)]
    pub run: RunSettings,

    /// Worker counts and pacing
    #[serde(default)]
    pub workers: WorkerSettings,

    /// Shutdown bounds
    #[serde(default)]
    pub shutdown: ShutdownSettings,
}

/// Run settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSettings {
    /// Bounded run duration in seconds
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,

    /// Alternation policy of the coordinator
    #[serde(default)]
    pub policy: AlternationPolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
            policy: AlternationPolicy::default(),
        }
    }
}

/// Worker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Number of phase-A workers
    #[serde(default = "default_phase_a_workers")]
    pub phase_a_workers: usize,

    /// Number of phase-B workers
    #[serde(default = "default_phase_b_workers")]
    pub phase_b_workers: usize,

    /// Nap before each phase-A entry, in milliseconds
    #[serde(default = "default_phase_a_interval_ms")]
    pub phase_a_interval_ms: u64,

    /// Nap before each phase-B entry, in milliseconds
    #[serde(default = "default_phase_b_interval_ms")]
    pub phase_b_interval_ms: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            phase_a_workers: default_phase_a_workers(),
            phase_b_workers: default_phase_b_workers(),
            phase_a_interval_ms: default_phase_a_interval_ms(),
            phase_b_interval_ms: default_phase_b_interval_ms(),
        }
    }
}

/// Shutdown settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownSettings {
    /// Maximum wait for exit reports after cancellation, in milliseconds
    #[serde(default = "default_exit_timeout_ms")]
    pub exit_timeout_ms: u64,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            exit_timeout_ms: default_exit_timeout_ms(),
        }
    }
}

// Default value helpers
fn default_duration_secs() -> u64 {
    3
}

fn default_phase_a_workers() -> usize {
    2
}

fn default_phase_b_workers() -> usize {
    1
}

fn default_phase_a_interval_ms() -> u64 {
    180
}

fn default_phase_b_interval_ms() -> u64 {
    200
}

fn default_exit_timeout_ms() -> u64 {
    500
}

impl HandoffConfig {
    /// Load configuration from an optional file plus environment overrides
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    /// Same as `load` with a custom environment prefix
    pub fn load_with_prefix(path: &Path, env_prefix: &str) -> Result<Self> {
        if path.exists() {
            tracing::info!("Loading configuration from {:?}", path);
        } else {
            tracing::debug!("Config file not found, using defaults: {:?}", path);
        }

        let config: HandoffConfig = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| HandoffError::Other(format!("Failed to serialize config: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml_string()?;

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, content)?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Reject values no run can honor
    pub fn validate(&self) -> Result<()> {
        if self.run.duration_secs == 0 {
            return Err(HandoffError::InvalidConfig(
                "run.duration_secs must be greater than zero".to_string(),
            ));
        }

        if self.workers.phase_a_workers == 0 && self.workers.phase_b_workers == 0 {
            return Err(HandoffError::InvalidConfig(
                "at least one worker is required".to_string(),
            ));
        }

        if self.shutdown.exit_timeout_ms == 0 {
            return Err(HandoffError::InvalidConfig(
                "shutdown.exit_timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Convert to DriverConfig
    pub fn to_driver_config(&self) -> DriverConfig {
        DriverConfig {
            run_duration: Duration::from_secs(self.run.duration_secs),
            phase_a_workers: self.workers.phase_a_workers,
            phase_b_workers: self.workers.phase_b_workers,
            phase_a_interval: Duration::from_millis(self.workers.phase_a_interval_ms),
            phase_b_interval: Duration::from_millis(self.workers.phase_b_interval_ms),
            exit_timeout: Duration::from_millis(self.shutdown.exit_timeout_ms),
            policy: self.run.policy,
        }
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        PathBuf::from("phase-handoff.toml")
    }
}
