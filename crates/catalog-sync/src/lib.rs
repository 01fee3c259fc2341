// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! catalog-sync: offline-durable delivery of product submissions.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  transitions  ┌──────────────────┐
//! │ Connectivity │──────────────►│ SyncOrchestrator │◄──── submit()
//! │   Monitor    │               └──────────────────┘
//! └──────────────┘                  │            │
//!                                   ▼            ▼
//!                          ┌──────────────┐ ┌──────────────┐
//!                          │   Uploader   │ │ BacklogStore │
//!                          │ (HTTP POST)  │ │   (JSONL)    │
//!                          └──────────────┘ └──────────────┘
//! ```
//!
//! A submission is uploaded straight away while the catalog service is
//! reachable. When it is not, or when that upload fails, the submission is
//! written to the backlog. Every `Unreachable -> Reachable` transition drains
//! the backlog with a bounded number of concurrent uploads and prunes each
//! entry once the service confirms it.
//!
//! Retries are unlimited and unpaced: every reconnect retries every pending
//! entry. There is no backoff and no per-entry attempt cap.

pub mod backlog;
pub mod cli;
mod commands;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod orchestrator;
pub mod upload;

#[cfg(test)]
mod test_support;

pub use backlog::{BacklogEntry, BacklogStore, StorageError};
pub use cli::{Cli, Command};
pub use commands::run;
pub use config::{Config, ConfigError};
pub use connectivity::{
    ConnectivityMonitor, ConnectivityState, ConnectivitySubscription, Probe, TcpProbe,
};
pub use error::{Error, Result};
pub use orchestrator::{
    DrainReport, DrainTrigger, OrchestratorState, SaveReason, SubmitOutcome, SyncError,
    SyncEvent, SyncOrchestrator,
};
pub use upload::{HttpUploader, UploadError, Uploader};
