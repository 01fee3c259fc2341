// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations for the `catalog-sync` binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use catalog_core::ProductForm;
use tokio::sync::broadcast::error::RecvError;

use crate::backlog::{BacklogEntry, BacklogStore};
use crate::cli::{Cli, Command};
use crate::config::{default_config_path, Config};
use crate::connectivity::{ConnectivityMonitor, ConnectivityState, Probe, TcpProbe};
use crate::error::Result;
use crate::orchestrator::{DrainReport, SaveReason, SubmitOutcome, SyncEvent, SyncOrchestrator};
use crate::upload::HttpUploader;

/// Execute a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref(), cli.data_dir, cli.endpoint)?;

    match cli.command {
        Command::Submit {
            name,
            price,
            tax,
            product_type,
            image,
        } => {
            let image = match image {
                Some(path) => Some(tokio::fs::read(&path).await?),
                None => None,
            };
            let form = ProductForm {
                name,
                price,
                tax,
                product_type,
                image,
            };
            let outcome = submit(&config, form).await?;
            match outcome {
                SubmitOutcome::DeliveredImmediately => println!("Delivered to the catalog."),
                SubmitOutcome::SavedForRetry { seq, reason } => {
                    let why = match reason {
                        SaveReason::Offline => "catalog service unreachable".to_string(),
                        SaveReason::UploadFailed(e) => e.to_string(),
                    };
                    println!("Saved locally as #{seq} ({why}); it will be sent when back online.");
                }
                SubmitOutcome::Rejected(e) => return Err(e.into()),
            }
        }
        Command::Pending => {
            let entries = pending(&config).await?;
            if entries.is_empty() {
                println!("No pending submissions.");
            }
            for entry in &entries {
                println!("{}", format_entry(entry));
            }
        }
        Command::Drain => match drain(&config).await? {
            Some(report) => println!("{}", format_report(&report)),
            None => println!("Catalog service unreachable; nothing sent."),
        },
        Command::Watch => watch(&config).await?,
    }
    Ok(())
}

/// Resolve the config file and apply command-line overrides.
pub(crate) fn load_config(
    path: Option<&Path>,
    data_dir: Option<PathBuf>,
    endpoint: Option<String>,
) -> Result<Config> {
    let mut config = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    if let Some(endpoint) = endpoint {
        config.endpoint = endpoint;
    }
    config.validate()?;
    Ok(config)
}

fn open_store(config: &Config) -> Result<Arc<BacklogStore>> {
    Ok(Arc::new(BacklogStore::open(&config.data_dir)?))
}

fn orchestrator(
    config: &Config,
    monitor: Arc<ConnectivityMonitor>,
) -> Result<SyncOrchestrator<HttpUploader>> {
    let store = open_store(config)?;
    let uploader = HttpUploader::new(config.endpoint.clone(), config.request_timeout())?;
    Ok(SyncOrchestrator::new(
        monitor,
        store,
        Arc::new(uploader),
        config.max_concurrent_uploads,
    ))
}

/// One-off commands take a single reading instead of running the probe loop.
async fn probe_once(config: &Config) -> ConnectivityState {
    let state = TcpProbe::new(config.probe_addr.clone(), config.probe_timeout())
        .probe()
        .await;
    tracing::debug!(addr = %config.probe_addr, %state, "probed catalog service");
    state
}

pub(crate) async fn submit(config: &Config, form: ProductForm) -> Result<SubmitOutcome> {
    let submission = form.into_submission()?;
    let monitor = Arc::new(ConnectivityMonitor::manual(probe_once(config).await));
    let orchestrator = orchestrator(config, monitor)?;
    Ok(orchestrator.submit(submission).await?)
}

pub(crate) async fn pending(config: &Config) -> Result<Vec<BacklogEntry>> {
    Ok(open_store(config)?.list_pending().await?)
}

/// Run one drain pass if the service is reachable.
pub(crate) async fn drain(config: &Config) -> Result<Option<DrainReport>> {
    let state = probe_once(config).await;
    if !state.is_reachable() {
        return Ok(None);
    }
    let monitor = Arc::new(ConnectivityMonitor::manual(state));
    Ok(orchestrator(config, monitor)?.drain_once().await)
}

async fn watch(config: &Config) -> Result<()> {
    let probe = TcpProbe::new(config.probe_addr.clone(), config.probe_timeout());
    let monitor = Arc::new(ConnectivityMonitor::spawn(probe, config.probe_interval()));
    let orchestrator = orchestrator(config, Arc::clone(&monitor))?;
    let mut events = orchestrator.subscribe();
    let listener = orchestrator.start();

    tracing::info!(
        endpoint = %config.endpoint,
        data_dir = %config.data_dir.display(),
        "watching for connectivity, press Ctrl-C to stop"
    );

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            event = events.recv() => match event {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event log fell behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    monitor.shutdown();
    if let Err(e) = listener.await {
        tracing::warn!(error = %e, "connectivity listener ended abnormally");
    }
    let remaining = orchestrator.current_backlog_count().await?;
    tracing::info!(remaining, "stopped");
    Ok(())
}

fn log_event(event: &SyncEvent) {
    match event {
        SyncEvent::Connectivity(state) => tracing::info!(%state, "connectivity"),
        SyncEvent::Submitted(outcome) => tracing::info!(?outcome, "submission"),
        SyncEvent::DrainStarted { pending } => tracing::info!(pending, "drain started"),
        SyncEvent::DrainCompleted(report) => tracing::info!("{}", format_report(report)),
    }
}

pub(crate) fn format_entry(entry: &BacklogEntry) -> String {
    let submission = entry.submission();
    format!(
        "#{:<4} {}  price={} tax={} type={} image={} saved={}",
        entry.sequence_index(),
        submission.name(),
        submission.price(),
        submission.tax_rate(),
        submission.category(),
        if submission.image().is_some() { "yes" } else { "no" },
        submission.created_at().format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

pub(crate) fn format_report(report: &DrainReport) -> String {
    let mut line = format!(
        "Drain finished: {} of {} delivered, {} failed, {} still pending",
        report.delivered, report.attempted, report.failed, report.remaining
    );
    if report.storage_errors > 0 {
        line.push_str(&format!(" ({} storage errors)", report.storage_errors));
    }
    line
}

#[cfg(test)]
#[path = "commands_tests.rs"]
mod tests;
