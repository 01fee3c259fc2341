// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Routing of submissions and draining of the backlog.
//!
//! The orchestrator has two states:
//!
//! ```text
//!            reconnect / trigger_drain
//!   ┌──────┐ ─────────────────────────► ┌──────────┐
//!   │ Idle │                            │ Draining │ ◄─┐ reconnect while
//!   └──────┘ ◄───────────────────────── └──────────┘ ──┘ draining: one
//!             pass done, no rerun pending                 follow-up pass
//! ```
//!
//! `submit` works the same in both states and never waits for a drain.
//! Only the backlog store is shared between submissions and drains, and it
//! serializes its own writes.

use std::sync::{Arc, Mutex, PoisonError};

use catalog_core::{EncodingError, Submission};
use futures_util::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::backlog::{BacklogEntry, BacklogStore, StorageError};
use crate::connectivity::{ConnectivityMonitor, ConnectivityState};
use crate::upload::{UploadError, Uploader};

/// Default number of uploads in flight during a drain.
pub const DEFAULT_MAX_CONCURRENT_UPLOADS: usize = 4;

const EVENT_BUFFER: usize = 64;

/// Error type for submissions. Only storage failures reach the caller;
/// upload failures become backlog entries.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("could not save submission locally: {0}")]
    Storage(#[from] StorageError),
}

/// Why a submission went to the backlog instead of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveReason {
    /// The service was unreachable at submit time.
    Offline,
    /// The immediate upload attempt failed.
    UploadFailed(UploadError),
}

/// What happened to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Uploaded and confirmed by the service.
    DeliveredImmediately,
    /// Durably saved; it will be retried on the next reconnect.
    SavedForRetry { seq: u64, reason: SaveReason },
    /// Cannot be sent in any form. Not saved.
    Rejected(EncodingError),
}

/// Result of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Entries in the snapshot this pass worked through.
    pub attempted: usize,
    /// Entries the service confirmed.
    pub delivered: usize,
    /// Entries whose upload failed; they stay pending.
    pub failed: usize,
    /// Storage operations that failed during the pass.
    pub storage_errors: usize,
    /// Backlog size after the pass.
    pub remaining: usize,
}

/// Whether a drain request started a pass or was folded into a running one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainTrigger {
    Started,
    Coalesced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    Draining,
}

/// Notifications for observers such as a UI.
///
/// Events are delivered on a runtime worker; observers that need a
/// particular thread must hop there themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Connectivity(ConnectivityState),
    Submitted(SubmitOutcome),
    DrainStarted { pending: usize },
    DrainCompleted(DrainReport),
}

#[derive(Default)]
struct DrainFlags {
    draining: bool,
    rerun: bool,
}

struct Inner<U> {
    monitor: Arc<ConnectivityMonitor>,
    store: Arc<BacklogStore>,
    uploader: Arc<U>,
    max_concurrent: usize,
    flags: Mutex<DrainFlags>,
    events: broadcast::Sender<SyncEvent>,
}

/// Decides where each submission goes and drains the backlog on reconnect.
pub struct SyncOrchestrator<U: Uploader> {
    inner: Arc<Inner<U>>,
}

impl<U: Uploader> Clone for SyncOrchestrator<U> {
    fn clone(&self) -> Self {
        SyncOrchestrator {
            inner: Arc::clone(&self.inner),
        }
    }
}

enum EntryResult {
    Delivered,
    DeliveredNotPruned,
    Failed,
}

impl<U: Uploader> SyncOrchestrator<U> {
    /// Create an orchestrator. `max_concurrent` is clamped to at least 1.
    pub fn new(
        monitor: Arc<ConnectivityMonitor>,
        store: Arc<BacklogStore>,
        uploader: Arc<U>,
        max_concurrent: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        SyncOrchestrator {
            inner: Arc::new(Inner {
                monitor,
                store,
                uploader,
                max_concurrent: max_concurrent.max(1),
                flags: Mutex::new(DrainFlags::default()),
                events,
            }),
        }
    }

    /// Listen for connectivity transitions and drain on every reconnect.
    ///
    /// If the service is already reachable, one drain starts right away so
    /// entries left over from an earlier run go out without waiting for a
    /// transition. The task ends when the monitor shuts down.
    pub fn start(&self) -> JoinHandle<()> {
        let mut subscription = self.inner.monitor.subscribe();
        let mut last = subscription.current();
        if last.is_reachable() {
            self.trigger_drain();
        }

        let this = self.clone();
        tokio::spawn(async move {
            while let Some(state) = subscription.changed().await {
                this.emit(SyncEvent::Connectivity(state));
                if state.is_reachable() && !last.is_reachable() {
                    tracing::info!("connectivity restored, draining backlog");
                    this.trigger_drain();
                }
                last = state;
            }
            tracing::debug!("orchestrator stopped listening for connectivity");
        })
    }

    /// Route a submission: upload now if reachable, otherwise save it.
    ///
    /// A failed immediate upload also saves the submission. The only error
    /// is a storage failure, in which case the submission was not kept.
    pub async fn submit(&self, submission: Submission) -> Result<SubmitOutcome, SyncError> {
        if let Err(e) = catalog_core::encoder::validate(&submission) {
            tracing::warn!(name = submission.name(), error = %e, "submission rejected");
            let outcome = SubmitOutcome::Rejected(e);
            self.emit(SyncEvent::Submitted(outcome.clone()));
            return Ok(outcome);
        }

        let outcome = match self.inner.monitor.current_state() {
            ConnectivityState::Reachable => {
                let attempt = self.inner.uploader.upload(&submission).await;
                match attempt {
                    Ok(()) => {
                        tracing::info!(name = submission.name(), "submission delivered");
                        SubmitOutcome::DeliveredImmediately
                    }
                    Err(e) => {
                        tracing::warn!(
                            name = submission.name(),
                            error = %e,
                            "upload failed, saving for retry"
                        );
                        let seq = self.save(submission).await?;
                        SubmitOutcome::SavedForRetry {
                            seq,
                            reason: SaveReason::UploadFailed(e),
                        }
                    }
                }
            }
            ConnectivityState::Unreachable => {
                tracing::info!(name = submission.name(), "offline, saving for retry");
                let seq = self.save(submission).await?;
                SubmitOutcome::SavedForRetry {
                    seq,
                    reason: SaveReason::Offline,
                }
            }
        };

        self.emit(SyncEvent::Submitted(outcome.clone()));
        Ok(outcome)
    }

    /// Start a drain in the background, or fold this request into the one
    /// already running. A folded request causes exactly one more pass after
    /// the current one, however many requests arrive meanwhile.
    pub fn trigger_drain(&self) -> DrainTrigger {
        if !self.begin_drain() {
            return DrainTrigger::Coalesced;
        }
        let this = self.clone();
        tokio::spawn(async move {
            this.run_drains().await;
        });
        DrainTrigger::Started
    }

    /// Run a drain inline and return the report of its last pass.
    ///
    /// Returns `None` if a drain was already running; in that case a
    /// follow-up pass has been scheduled on it instead.
    pub async fn drain_once(&self) -> Option<DrainReport> {
        if !self.begin_drain() {
            return None;
        }
        Some(self.run_drains().await)
    }

    pub fn state(&self) -> OrchestratorState {
        if self.flags().draining {
            OrchestratorState::Draining
        } else {
            OrchestratorState::Idle
        }
    }

    /// Number of submissions waiting in the backlog.
    pub async fn current_backlog_count(&self) -> Result<usize, SyncError> {
        Ok(self.inner.store.count().await?)
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.inner.monitor.current_state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    async fn save(&self, submission: Submission) -> Result<u64, SyncError> {
        match self.inner.store.append(submission).await {
            Ok(entry) => Ok(entry.sequence_index()),
            Err(e) => {
                tracing::error!(error = %e, "failed to save submission to backlog");
                Err(e.into())
            }
        }
    }

    fn flags(&self) -> std::sync::MutexGuard<'_, DrainFlags> {
        self.inner
            .flags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the drain. Returns false (and records a rerun) if taken.
    fn begin_drain(&self) -> bool {
        let mut flags = self.flags();
        if flags.draining {
            flags.rerun = true;
            tracing::debug!("drain already running, follow-up pass scheduled");
            return false;
        }
        flags.draining = true;
        true
    }

    /// Run passes until no rerun is pending, then release the drain.
    async fn run_drains(&self) -> DrainReport {
        loop {
            let report = self.drain_pass().await;
            if !self.take_rerun() {
                return report;
            }
        }
    }

    /// Consume a pending rerun, or release the drain if there is none.
    fn take_rerun(&self) -> bool {
        let mut flags = self.flags();
        if flags.rerun {
            flags.rerun = false;
            true
        } else {
            flags.draining = false;
            false
        }
    }

    async fn drain_pass(&self) -> DrainReport {
        let pending = match self.inner.store.list_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                tracing::error!(error = %e, "failed to read backlog");
                let report = DrainReport {
                    storage_errors: 1,
                    ..DrainReport::default()
                };
                self.emit(SyncEvent::DrainCompleted(report));
                return report;
            }
        };

        self.emit(SyncEvent::DrainStarted {
            pending: pending.len(),
        });
        let mut report = DrainReport {
            attempted: pending.len(),
            ..DrainReport::default()
        };

        if !pending.is_empty() {
            let results: Vec<EntryResult> = stream::iter(pending)
                .map(|entry| self.deliver(entry))
                .buffer_unordered(self.inner.max_concurrent)
                .collect()
                .await;

            for result in results {
                match result {
                    EntryResult::Delivered => report.delivered += 1,
                    EntryResult::DeliveredNotPruned => {
                        report.delivered += 1;
                        report.storage_errors += 1;
                    }
                    EntryResult::Failed => report.failed += 1,
                }
            }
        }

        report.remaining = match self.inner.store.count().await {
            Ok(n) => n,
            Err(e) => {
                tracing::error!(error = %e, "failed to count backlog");
                report.storage_errors += 1;
                report.attempted - report.delivered
            }
        };

        tracing::info!(
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            remaining = report.remaining,
            "drain pass finished"
        );
        self.emit(SyncEvent::DrainCompleted(report));
        report
    }

    async fn deliver(&self, entry: BacklogEntry) -> EntryResult {
        let seq = entry.sequence_index();
        match self.inner.uploader.upload(entry.submission()).await {
            Ok(()) => match self.inner.store.remove(seq).await {
                Ok(()) => EntryResult::Delivered,
                Err(e) => {
                    tracing::error!(seq, error = %e, "delivered entry could not be pruned");
                    EntryResult::DeliveredNotPruned
                }
            },
            Err(e) => {
                tracing::warn!(seq, error = %e, "upload failed, entry stays pending");
                EntryResult::Failed
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        // No receivers is fine.
        let _ = self.inner.events.send(event);
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
