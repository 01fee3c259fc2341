// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for catalog-sync tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use catalog_core::{Category, Submission};
use rust_decimal::Decimal;
use tokio::sync::Semaphore;

use crate::upload::{UploadError, UploadResult, Uploader};

/// A valid submission: price 10, tax 1, category Shoes.
pub fn make_submission(name: &str) -> Submission {
    Submission::new(
        name,
        Decimal::new(10, 0),
        Decimal::new(1, 0),
        Category::Shoes,
        None,
    )
    .unwrap()
}

/// Uploader double that records every call.
///
/// Uploads succeed unless a failure is scripted for the submission's name.
/// A gated uploader parks every call until [`MockUploader::release`] hands
/// out permits.
pub struct MockUploader {
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, UploadError>>,
    gate: Option<Semaphore>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Duration,
}

impl MockUploader {
    pub fn new() -> Self {
        MockUploader {
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            gate: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Every upload waits for a permit from [`MockUploader::release`].
    pub fn gated() -> Self {
        MockUploader {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    /// Every upload takes `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        MockUploader {
            delay,
            ..Self::new()
        }
    }

    /// Make uploads of `name` fail with `error` until cleared.
    pub fn fail(&self, name: &str, error: UploadError) {
        self.failures.lock().unwrap().insert(name.to_string(), error);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Let `n` parked uploads proceed.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Names of all submissions passed to `upload`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` uploads have started.
    pub async fn wait_for_calls(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls.lock().unwrap().len() < n {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("timed out waiting for uploads");
    }
}

impl Default for MockUploader {
    fn default() -> Self {
        Self::new()
    }
}

impl Uploader for MockUploader {
    fn upload<'a>(
        &'a self,
        submission: &'a Submission,
    ) -> Pin<Box<dyn Future<Output = UploadResult<()>> + Send + 'a>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push(submission.name().to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let failure = self.failures.lock().unwrap().get(submission.name()).cloned();
            match failure {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }
}
