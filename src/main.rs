//! ingress-sync
//!
//! Keeps HAProxy backends in line with the cluster snapshot written by the
//! resource watcher.
//!
//! # Architecture Overview
//!
//! ```text
//!   snapshot.json ──▶ SnapshotWatcher ──▶ Controller::reconcile
//!                                              │
//!                         ┌────────────────────┼─────────────────────┐
//!                         ▼                    ▼                     ▼
//!                  global/defaults      backend config        Synchronizer
//!                  (change detector)    (change detector)     (slot pools)
//!                         │                    │                     │
//!                         └──────────▶ HaproxyClient ◀───────────────┘
//!                                 runtime socket + Data Plane API
//! ```
//!
//! Reloads and restarts are reported (log + metric) for the process supervisor.

use std::path::PathBuf;
use std::time::Duration;
use clap::Parser;

use ingress_sync::config::{load_config, ControllerConfig};
use ingress_sync::controller::{load_snapshot, Controller, ReconcileOutcome, SnapshotWatcher};
use ingress_sync::haproxy::dataplane::DataPlaneClient;
use ingress_sync::haproxy::runtime::RuntimeClient;
use ingress_sync::haproxy::HaproxyClient;
use ingress_sync::lifecycle::{wait_for_signal, Shutdown};
use ingress_sync::observability::{logging, metrics};
use ingress_sync::resilience::Backoff;
use ingress_sync::SyncAction;

#[derive(Parser)]
#[command(name = "ingress-sync")]
#[command(about = "Synchronize HAProxy backends with cluster endpoints", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Cluster snapshot to reconcile (overrides controller.snapshot_path).
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    /// Run a single pass and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ControllerConfig::default(),
    };
    if let Some(snapshot) = &cli.snapshot {
        config.controller.snapshot_path = snapshot.display().to_string();
    }

    logging::init(&config.observability.log_level);
    tracing::info!("ingress-sync v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let runtime = RuntimeClient::new(
        &config.runtime.socket_path,
        Duration::from_millis(config.runtime.timeout_ms),
    );
    let dataplane = DataPlaneClient::new(
        &config.dataplane.url,
        &config.dataplane.username,
        &config.dataplane.password,
        Duration::from_secs(config.dataplane.timeout_secs),
    )?;
    let mut controller = Controller::new(HaproxyClient::new(runtime, dataplane), &config.controller);

    tracing::info!(
        snapshot = %config.controller.snapshot_path,
        runtime_socket = %config.runtime.socket_path,
        dataplane = %config.dataplane.url,
        sync_period_secs = config.controller.sync_period_secs,
        "Configuration loaded"
    );

    let snapshot_path = PathBuf::from(&config.controller.snapshot_path);
    let mut snapshot = load_snapshot(&snapshot_path)?;

    if cli.once {
        let outcome = controller.reconcile(&snapshot).await;
        report(&outcome);
        if !outcome.is_success() {
            return Err(format!(
                "{} backend(s) and {} section(s) failed",
                outcome.failed_backends.len(),
                outcome.failed_sections.len()
            )
            .into());
        }
        return Ok(());
    }

    let shutdown = Shutdown::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));
    let mut shutdown_rx = shutdown.subscribe();

    let (watcher, mut updates) = SnapshotWatcher::new(&snapshot_path);
    let _watcher = watcher.run()?;

    let period = Duration::from_secs(config.controller.sync_period_secs);
    let mut backoff = Backoff::new(&config.retries);

    loop {
        let outcome = controller.reconcile(&snapshot).await;
        report(&outcome);

        let delay = if outcome.is_success() {
            backoff.reset();
            period
        } else {
            let delay = backoff.fail();
            tracing::warn!(attempt = backoff.failures(), delay_ms = delay.as_millis() as u64, "Pass failed, retrying");
            delay
        };

        tokio::select! {
            _ = shutdown_rx.recv() => break,
            update = updates.recv() => match update {
                Some(next) => snapshot = next,
                None => break,
            },
            _ = tokio::time::sleep(delay) => {}
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Surface the action the supervisor has to take.
fn report(outcome: &ReconcileOutcome) {
    match outcome.action {
        SyncAction::None => {}
        SyncAction::Reload => tracing::warn!("HAProxy reload required"),
        SyncAction::Restart => tracing::warn!("HAProxy restart required"),
    }
    for backend in &outcome.failed_backends {
        tracing::debug!(backend = %backend, "Backend will be retried");
    }
}
