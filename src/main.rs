//! Phase Handoff - demonstration entry point
//!
//! Runs one phase-B worker and two phase-A workers against a shared
//! coordinator for a bounded duration, cancels them, and prints the summary.

use anyhow::{Context, Result};
use clap::Parser;
use phase_handoff::{AlternationPolicy, Driver, HandoffConfig, RunSummary, WorkerExit};
use std::path::PathBuf;
use tracing::{debug, warn, Level};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(name = "phase-handoff")]
#[command(
    about = "Two-phase mutual-exclusion handoff between cooperating workers",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "PHASE_HANDOFF_CONFIG")]
    config: Option<PathBuf>,

    /// Run duration in seconds
    #[arg(short, long)]
    duration_secs: Option<u64>,

    /// Number of phase-A workers
    #[arg(long)]
    phase_a_workers: Option<usize>,

    /// Number of phase-B workers
    #[arg(long)]
    phase_b_workers: Option<usize>,

    /// Refuse redundant phase entries instead of accepting them
    #[arg(long)]
    strict: bool,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, default_value = "info", env = "PHASE_HANDOFF_LOG")]
    log_level: String,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Print the resolved configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration
    fn apply_overrides(&self, config: &mut HandoffConfig) {
        if let Some(secs) = self.duration_secs {
            config.run.duration_secs = secs;
        }
        if let Some(count) = self.phase_a_workers {
            config.workers.phase_a_workers = count;
        }
        if let Some(count) = self.phase_b_workers {
            config.workers.phase_b_workers = count;
        }
        if self.strict {
            config.run.policy = AlternationPolicy::Strict;
        }
    }
}

fn init_tracing(log_level: &str) {
    let level = match log_level {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::new(format!(
        "phase_handoff={}",
        level.as_str().to_lowercase()
    ));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // Logs on stderr, summary on stdout
        .init();
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Run finished after {:.2}s (shutdown took {}ms)",
        summary.run_elapsed_ms as f64 / 1000.0,
        summary.shutdown_elapsed_ms
    );
    println!(
        "  final phase: {}, entries: {}, transitions: {}, rejected: {}, handoffs: {}",
        summary.snapshot.phase,
        summary.snapshot.entries,
        summary.snapshot.transitions,
        summary.snapshot.rejected,
        summary.completed_handoffs()
    );

    for report in &summary.reports {
        let exit = match report.exit {
            WorkerExit::Cancelled => "exited via cancellation",
        };
        println!("  {}: {} cycle(s), {}", report.id, report.cycles, exit);
    }

    if summary.dropped_events > 0 {
        println!("  ({} event(s) not recorded)", summary.dropped_events);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    debug!("phase-handoff v{} starting...", env!("CARGO_PKG_VERSION"));

    let path = cli.config.clone().unwrap_or_else(HandoffConfig::default_path);
    let mut config = HandoffConfig::load(&path)
        .with_context(|| format!("Failed to load configuration from {:?}", path))?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    if cli.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let driver = Driver::new(config.to_driver_config());
    let summary = driver
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}
