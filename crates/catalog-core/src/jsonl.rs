// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! JSON Lines file helpers.
//!
//! Each record is one JSON line. Writes are fsynced before returning so a
//! record that was reported as written survives a crash.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{JsonlError, JsonlResult};

/// Appends a record to a JSONL file with fsync for durability.
///
/// The parent directory must already exist. If the write or the fsync
/// fails, the file is truncated back to its previous length so no partial
/// line is left for the next append to run into.
pub fn append<T: Serialize>(path: &Path, record: &T) -> JsonlResult<()> {
    let json = serde_json::to_string(record)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let start = file.metadata()?.len();
    if let Err(e) = writeln!(file, "{json}").and_then(|()| file.sync_all()) {
        let _ = file.set_len(start);
        return Err(e.into());
    }
    Ok(())
}

/// Reads all records from a JSONL file.
///
/// Skips blank lines and returns an empty vec if the file doesn't exist.
pub fn read_all<T: DeserializeOwned>(path: &Path) -> JsonlResult<Vec<T>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| JsonlError::Json {
            line: idx + 1,
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Replaces the file's content with `records`.
///
/// Writes to a sibling temp file and renames it over the existing file, so a
/// crash mid-rewrite leaves the old content intact.
pub fn write_all<T: Serialize>(path: &Path, records: &[T]) -> JsonlResult<()> {
    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut file = File::create(&tmp)?;
        for record in records {
            let json = serde_json::to_string(record)?;
            writeln!(file, "{json}")?;
        }
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;

    Ok(())
}

/// Records read back by [`recover`].
#[derive(Debug)]
pub struct Recovered<T> {
    pub records: Vec<T>,
    /// Line number of an unparseable final line that was cut off, if any.
    pub torn_line: Option<usize>,
}

/// Reads all records, repairing a torn tail left by an interrupted append.
///
/// An unparseable line followed only by whitespace is treated as a write
/// that never completed: it is truncated away and reported in
/// [`Recovered::torn_line`]. A final record missing its newline gets one.
/// A bad line anywhere else is still a [`JsonlError::Json`].
pub fn recover<T: DeserializeOwned>(path: &Path) -> JsonlResult<Recovered<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(Recovered {
                records: Vec::new(),
                torn_line: None,
            })
        }
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    let mut torn_line = None;
    let mut valid_len = 0;
    let mut start = 0;
    let mut line_no = 0;

    while start < bytes.len() {
        line_no += 1;
        let end = bytes[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(bytes.len(), |p| start + p);
        let next = (end + 1).min(bytes.len());
        let line = &bytes[start..end];

        if !line.iter().all(u8::is_ascii_whitespace) {
            match serde_json::from_slice(line) {
                Ok(record) => {
                    records.push(record);
                    valid_len = next;
                }
                Err(_) if bytes[next..].iter().all(u8::is_ascii_whitespace) => {
                    torn_line = Some(line_no);
                    break;
                }
                Err(source) => {
                    return Err(JsonlError::Json {
                        line: line_no,
                        source,
                    })
                }
            }
        }
        start = next;
    }

    let kept_len = if torn_line.is_some() {
        valid_len
    } else {
        bytes.len()
    };
    let needs_newline = kept_len > 0 && bytes[kept_len - 1] != b'\n';
    if torn_line.is_some() || needs_newline {
        let mut file = OpenOptions::new().append(true).open(path)?;
        if torn_line.is_some() {
            file.set_len(kept_len as u64)?;
        }
        if needs_newline {
            file.write_all(b"\n")?;
        }
        file.sync_all()?;
    }

    Ok(Recovered { records, torn_line })
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
