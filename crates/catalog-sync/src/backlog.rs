// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable backlog of submissions waiting for delivery.
//!
//! The backlog is a JSONL log in the data directory. Every append and every
//! removal is written as its own fsynced line, so the log is only ever
//! appended to between compactions:
//!
//! ```text
//! {"kind":"watermark","next_seq":4}
//! {"kind":"append","seq":4,"entry":{...}}
//! {"kind":"remove","seq":4}
//! ```
//!
//! Images live next to the log as `images/<seq>.jpg`. Sequence indices grow
//! monotonically and are never handed out twice, including across restarts
//! and compactions (the watermark record carries the counter forward).
//!
//! A store holds an exclusive lock on `backlog.lock` for as long as it is
//! open, so only one process at a time owns a data directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use catalog_core::{jsonl, Category, JsonlError, Submission};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

const LOG_FILE_NAME: &str = "backlog.jsonl";
const IMAGES_DIR_NAME: &str = "images";
const LOCK_FILE_NAME: &str = "backlog.lock";

/// Number of removal records after which the log is rewritten.
const COMPACT_AFTER_REMOVALS: usize = 64;

/// Error type for backlog storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The log holds a record that cannot be turned back into an entry.
    #[error("corrupted backlog: {0}")]
    Corrupted(String),

    /// Another store, usually another process, has the data directory open.
    #[error("backlog in {} is in use by another catalog-sync process", dir.display())]
    Locked { dir: PathBuf },
}

impl From<JsonlError> for StorageError {
    fn from(e: JsonlError) -> Self {
        match e {
            JsonlError::Io(e) => StorageError::Io(e),
            JsonlError::Serialize(e) => StorageError::Serialization(e),
            JsonlError::Json { line, source } => {
                StorageError::Corrupted(format!("line {line}: {source}"))
            }
        }
    }
}

/// Result type for backlog storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A pending submission and its position in the backlog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacklogEntry {
    seq: u64,
    submission: Submission,
}

impl BacklogEntry {
    /// Stable key of this entry. Removal is always by this index, never by
    /// position in a listing.
    pub fn sequence_index(&self) -> u64 {
        self.seq
    }

    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    pub fn into_submission(self) -> Submission {
        self.submission
    }
}

/// On-disk form of a submission. Field names follow the catalog wire names.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSubmission {
    product_name: String,
    price: Decimal,
    tax: Decimal,
    product_type: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_file: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum LogRecord {
    Append { seq: u64, entry: StoredSubmission },
    Remove { seq: u64 },
    Watermark { next_seq: u64 },
}

struct Inner {
    entries: BTreeMap<u64, BacklogEntry>,
    next_seq: u64,
    removals_since_compact: usize,
}

/// The durable backlog.
///
/// All operations take the same lock, so appends and removals are applied
/// one at a time and a listing never observes a half-applied change.
pub struct BacklogStore {
    log_path: PathBuf,
    images_dir: PathBuf,
    inner: Mutex<Inner>,
    // Released when the store is dropped.
    _lock: fs::File,
}

impl BacklogStore {
    /// Open the backlog in `dir`, creating the directory if needed.
    ///
    /// Fails with [`StorageError::Locked`] if another store has `dir` open.
    /// The log is replayed into memory and compacted if it holds removals.
    /// A final line torn by an interrupted write is dropped.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        let images_dir = dir.join(IMAGES_DIR_NAME);
        fs::create_dir_all(&images_dir)?;
        let lock = acquire_lock(dir)?;
        let log_path = dir.join(LOG_FILE_NAME);

        let recovered = jsonl::recover::<LogRecord>(&log_path)?;
        if let Some(line) = recovered.torn_line {
            tracing::warn!(path = %log_path.display(), line, "dropped torn record at end of backlog");
        }

        let mut stored = BTreeMap::new();
        let mut next_seq = 0u64;
        let mut removals = 0usize;

        for record in recovered.records {
            match record {
                LogRecord::Append { seq, entry } => {
                    stored.insert(seq, entry);
                    next_seq = next_seq.max(seq.saturating_add(1));
                }
                LogRecord::Remove { seq } => {
                    stored.remove(&seq);
                    removals += 1;
                }
                LogRecord::Watermark { next_seq: mark } => {
                    next_seq = next_seq.max(mark);
                }
            }
        }

        // Only surviving entries still have their image on disk.
        let mut entries = BTreeMap::new();
        for (seq, entry) in stored {
            let submission = restore(&images_dir, &entry)?;
            entries.insert(seq, BacklogEntry { seq, submission });
        }

        let inner = Inner {
            entries,
            next_seq,
            removals_since_compact: 0,
        };
        if removals > 0 {
            jsonl::write_all(&log_path, &snapshot_records(&inner))?;
        }

        tracing::debug!(
            path = %log_path.display(),
            pending = inner.entries.len(),
            next_seq,
            "opened backlog"
        );

        Ok(BacklogStore {
            log_path,
            images_dir,
            inner: Mutex::new(inner),
            _lock: lock,
        })
    }

    /// Persist a submission and return its entry.
    ///
    /// When this returns an error nothing was stored and the submission must
    /// be treated as not saved.
    pub async fn append(&self, submission: Submission) -> StorageResult<BacklogEntry> {
        let mut inner = self.inner.lock().await;
        let seq = inner.next_seq;
        // Never reused, even if the write below fails part-way.
        inner.next_seq = seq.saturating_add(1);

        let image_file = match submission.image() {
            Some(bytes) => {
                let name = image_file_name(seq);
                tokio::fs::write(self.images_dir.join(&name), bytes).await?;
                Some(name)
            }
            None => None,
        };

        let record = LogRecord::Append {
            seq,
            entry: stored(&submission, image_file.clone()),
        };
        if let Err(e) = append_record(&self.log_path, record).await {
            if let Some(name) = image_file {
                let _ = tokio::fs::remove_file(self.images_dir.join(name)).await;
            }
            return Err(e);
        }

        let entry = BacklogEntry { seq, submission };
        inner.entries.insert(seq, entry.clone());
        tracing::debug!(seq, pending = inner.entries.len(), "appended to backlog");

        Ok(entry)
    }

    /// Snapshot of all pending entries in insertion order.
    pub async fn list_pending(&self) -> StorageResult<Vec<BacklogEntry>> {
        let inner = self.inner.lock().await;
        Ok(inner.entries.values().cloned().collect())
    }

    /// Remove the entry with the given sequence index.
    ///
    /// Removing an index that is not pending is a no-op.
    pub async fn remove(&self, seq: u64) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.entries.get(&seq) else {
            return Ok(());
        };
        let had_image = entry.submission.image().is_some();

        append_record(&self.log_path, LogRecord::Remove { seq }).await?;
        inner.entries.remove(&seq);
        inner.removals_since_compact += 1;

        if had_image {
            match tokio::fs::remove_file(self.images_dir.join(image_file_name(seq))).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(seq, error = %e, "failed to delete backlog image"),
            }
        }

        if inner.removals_since_compact >= COMPACT_AFTER_REMOVALS {
            let records = snapshot_records(&inner);
            match rewrite_log(&self.log_path, records).await {
                Ok(()) => inner.removals_since_compact = 0,
                Err(e) => tracing::warn!(error = %e, "backlog compaction failed"),
            }
        }

        Ok(())
    }

    /// Number of pending entries.
    pub async fn count(&self) -> StorageResult<usize> {
        Ok(self.inner.lock().await.entries.len())
    }

    /// Path of the backing log file.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

fn acquire_lock(dir: &Path) -> StorageResult<fs::File> {
    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(dir.join(LOCK_FILE_NAME))?;
    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => Err(StorageError::Locked {
            dir: dir.to_path_buf(),
        }),
        Err(e) => Err(e.into()),
    }
}

fn image_file_name(seq: u64) -> String {
    format!("{seq}.jpg")
}

fn stored(submission: &Submission, image_file: Option<String>) -> StoredSubmission {
    StoredSubmission {
        product_name: submission.name().to_string(),
        price: submission.price(),
        tax: submission.tax_rate(),
        product_type: submission.category(),
        image_file,
        created_at: submission.created_at(),
    }
}

fn restore(images_dir: &Path, entry: &StoredSubmission) -> StorageResult<Submission> {
    let image = match &entry.image_file {
        Some(name) => Some(fs::read(images_dir.join(name)).map_err(|e| {
            StorageError::Corrupted(format!("image {name} for '{}': {e}", entry.product_name))
        })?),
        None => None,
    };

    Submission::from_parts(
        entry.product_name.clone(),
        entry.price,
        entry.tax,
        entry.product_type,
        image,
        entry.created_at,
    )
    .map_err(|e| StorageError::Corrupted(format!("entry '{}': {e}", entry.product_name)))
}

/// Records that reproduce the current state: the watermark, then one append
/// per pending entry.
fn snapshot_records(inner: &Inner) -> Vec<LogRecord> {
    let mut records = Vec::with_capacity(inner.entries.len() + 1);
    records.push(LogRecord::Watermark {
        next_seq: inner.next_seq,
    });
    for entry in inner.entries.values() {
        let image_file = entry
            .submission
            .image()
            .map(|_| image_file_name(entry.seq));
        records.push(LogRecord::Append {
            seq: entry.seq,
            entry: stored(&entry.submission, image_file),
        });
    }
    records
}

async fn append_record(path: &Path, record: LogRecord) -> StorageResult<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || jsonl::append(&path, &record))
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
        .map_err(StorageError::from)
}

async fn rewrite_log(path: &Path, records: Vec<LogRecord>) -> StorageResult<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || jsonl::write_all(&path, &records))
        .await
        .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
        .map_err(StorageError::from)
}

#[cfg(test)]
#[path = "backlog_tests.rs"]
mod tests;
