// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::backlog::StorageError;
use crate::config::ConfigError;
use crate::orchestrator::SyncError;
use crate::upload::UploadError;

/// Errors surfaced by the `catalog-sync` command-line front end.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(#[from] catalog_core::ValidationError),

    #[error("submission rejected: {0}")]
    Encoding(#[from] catalog_core::EncodingError),

    #[error("backlog storage error: {0}\n  hint: the product was NOT saved, submit it again")]
    Storage(#[from] StorageError),

    #[error("upload client error: {0}")]
    Upload(#[from] UploadError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

impl From<SyncError> for Error {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Storage(e) => Error::Storage(e),
        }
    }
}

/// A specialized Result type for the command-line front end.
pub type Result<T> = std::result::Result<T, Error>;
