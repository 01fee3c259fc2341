// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Upload client for the catalog service.
//!
//! An [`Uploader`] makes exactly one attempt per call. Retrying is the
//! orchestrator's business, so nothing here loops, sleeps, or keeps state
//! between calls.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use catalog_core::{EncodingError, Submission};
use reqwest::header::CONTENT_TYPE;

/// Error type for a single upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    /// The request never got an HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with a non-2xx status.
    #[error("server rejected submission with status {0}")]
    ServerRejected(u16),

    /// No response within the request timeout.
    #[error("request timed out")]
    Timeout,

    /// The submission could not be turned into a request body.
    #[error("cannot encode submission: {0}")]
    Encoding(#[from] EncodingError),
}

/// Result type for upload operations.
pub type UploadResult<T> = Result<T, UploadError>;

/// One-shot delivery of a submission to the catalog service.
///
/// Implementations must not retry and must not touch shared state: the
/// orchestrator calls `upload` from several tasks at once during a drain.
pub trait Uploader: Send + Sync + 'static {
    /// Send the submission. `Ok` means the service confirmed it.
    fn upload<'a>(
        &'a self,
        submission: &'a Submission,
    ) -> Pin<Box<dyn Future<Output = UploadResult<()>> + Send + 'a>>;
}

/// Uploads submissions as `multipart/form-data` POST requests.
pub struct HttpUploader {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUploader {
    /// Create an uploader for `endpoint` with a per-request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> UploadResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::Network(e.to_string()))?;

        Ok(HttpUploader {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Uploader for HttpUploader {
    fn upload<'a>(
        &'a self,
        submission: &'a Submission,
    ) -> Pin<Box<dyn Future<Output = UploadResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let body = catalog_core::encode(submission)?;

            let response = self
                .client
                .post(&self.endpoint)
                .header(CONTENT_TYPE, body.content_type())
                .body(body.into_bytes())
                .send()
                .await
                .map_err(classify)?;

            let status = response.status();
            if status.is_success() {
                tracing::debug!(name = submission.name(), %status, "upload accepted");
                Ok(())
            } else {
                Err(UploadError::ServerRejected(status.as_u16()))
            }
        })
    }
}

fn classify(e: reqwest::Error) -> UploadError {
    if e.is_timeout() {
        UploadError::Timeout
    } else {
        UploadError::Network(e.to_string())
    }
}

#[cfg(test)]
#[path = "upload_tests.rs"]
mod tests;
