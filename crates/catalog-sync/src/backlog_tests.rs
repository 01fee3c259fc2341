// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the backlog store.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use crate::test_support::make_submission;
use std::sync::Arc;
use tempfile::tempdir;

fn names(entries: &[BacklogEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.submission().name().to_string())
        .collect()
}

#[tokio::test]
async fn append_lists_in_insertion_order() {
    let dir = tempdir().unwrap();
    let store = BacklogStore::open(dir.path()).unwrap();

    store.append(make_submission("first")).await.unwrap();
    store.append(make_submission("second")).await.unwrap();
    store.append(make_submission("third")).await.unwrap();

    let pending = store.list_pending().await.unwrap();
    assert_eq!(names(&pending), vec!["first", "second", "third"]);
    assert_eq!(store.count().await.unwrap(), 3);
}

#[tokio::test]
async fn sequence_indices_increase() {
    let dir = tempdir().unwrap();
    let store = BacklogStore::open(dir.path()).unwrap();

    let a = store.append(make_submission("a")).await.unwrap();
    let b = store.append(make_submission("b")).await.unwrap();

    assert!(b.sequence_index() > a.sequence_index());
}

#[tokio::test]
async fn entries_survive_reopen() {
    let dir = tempdir().unwrap();
    let jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0];

    {
        let store = BacklogStore::open(dir.path()).unwrap();
        store.append(make_submission("plain")).await.unwrap();
        let with_image = catalog_core::Submission::new(
            "pictured",
            Decimal::new(1999, 2),
            Decimal::new(5, 0),
            Category::Electronics,
            Some(jpeg.clone()),
        )
        .unwrap();
        store.append(with_image.clone()).await.unwrap();
    }

    let store = BacklogStore::open(dir.path()).unwrap();
    let pending = store.list_pending().await.unwrap();
    assert_eq!(names(&pending), vec!["plain", "pictured"]);

    let restored = pending[1].submission();
    assert_eq!(restored.image(), Some(jpeg.as_slice()));
    assert_eq!(restored.price(), Decimal::new(1999, 2));
    assert_eq!(restored.category(), Category::Electronics);
}

#[tokio::test]
async fn remove_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = BacklogStore::open(dir.path()).unwrap();

    let a = store.append(make_submission("a")).await.unwrap();
    store.append(make_submission("b")).await.unwrap();

    store.remove(a.sequence_index()).await.unwrap();
    let after_once = store.list_pending().await.unwrap();

    store.remove(a.sequence_index()).await.unwrap();
    let after_twice = store.list_pending().await.unwrap();

    assert_eq!(after_once, after_twice);
    assert_eq!(names(&after_twice), vec!["b"]);
}

#[tokio::test]
async fn remove_unknown_index_is_noop() {
    let dir = tempdir().unwrap();
    let store = BacklogStore::open(dir.path()).unwrap();
    store.append(make_submission("a")).await.unwrap();

    store.remove(999).await.unwrap();

    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn removal_order_does_not_matter() {
    async fn remaining_after(order: [usize; 2]) -> Vec<String> {
        let dir = tempdir().unwrap();
        let store = BacklogStore::open(dir.path()).unwrap();
        let mut entries = Vec::new();
        for name in ["a", "b", "c", "d"] {
            entries.push(store.append(make_submission(name)).await.unwrap());
        }
        for idx in order {
            store.remove(entries[idx].sequence_index()).await.unwrap();
        }
        names(&store.list_pending().await.unwrap())
    }

    let forward = remaining_after([1, 3]).await;
    let backward = remaining_after([3, 1]).await;

    assert_eq!(forward, vec!["a", "c"]);
    assert_eq!(forward, backward);
}

#[tokio::test]
async fn removal_survives_reopen_and_deletes_image() {
    let dir = tempdir().unwrap();
    let seq = {
        let store = BacklogStore::open(dir.path()).unwrap();
        let s = catalog_core::Submission::new(
            "pictured",
            Decimal::ONE,
            Decimal::ZERO,
            Category::Shoes,
            Some(vec![1, 2, 3]),
        )
        .unwrap();
        let entry = store.append(s).await.unwrap();
        store.append(make_submission("kept")).await.unwrap();
        store.remove(entry.sequence_index()).await.unwrap();
        entry.sequence_index()
    };

    assert!(!dir
        .path()
        .join("images")
        .join(format!("{seq}.jpg"))
        .exists());

    let store = BacklogStore::open(dir.path()).unwrap();
    assert_eq!(names(&store.list_pending().await.unwrap()), vec!["kept"]);
}

#[tokio::test]
async fn indices_are_not_reused_after_restart() {
    let dir = tempdir().unwrap();
    let first = {
        let store = BacklogStore::open(dir.path()).unwrap();
        let entry = store.append(make_submission("gone")).await.unwrap();
        store.remove(entry.sequence_index()).await.unwrap();
        entry.sequence_index()
    };

    // Reopen twice: the first reopen compacts the log away entirely.
    drop(BacklogStore::open(dir.path()).unwrap());
    let store = BacklogStore::open(dir.path()).unwrap();
    let next = store.append(make_submission("new")).await.unwrap();

    assert!(next.sequence_index() > first);
}

#[tokio::test]
async fn reopen_compacts_removals() {
    let dir = tempdir().unwrap();
    {
        let store = BacklogStore::open(dir.path()).unwrap();
        let a = store.append(make_submission("a")).await.unwrap();
        store.append(make_submission("b")).await.unwrap();
        store.remove(a.sequence_index()).await.unwrap();
    }

    let store = BacklogStore::open(dir.path()).unwrap();
    let log = std::fs::read_to_string(store.log_path()).unwrap();

    assert!(!log.contains("\"remove\""));
    assert!(log.contains("\"watermark\""));
    assert_eq!(log.matches("\"append\"").count(), 1);
}

#[tokio::test]
async fn snapshot_is_not_affected_by_later_appends() {
    let dir = tempdir().unwrap();
    let store = BacklogStore::open(dir.path()).unwrap();
    store.append(make_submission("a")).await.unwrap();

    let snapshot = store.list_pending().await.unwrap();
    store.append(make_submission("b")).await.unwrap();

    assert_eq!(names(&snapshot), vec!["a"]);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_are_all_kept() {
    let dir = tempdir().unwrap();
    let store = Arc::new(BacklogStore::open(dir.path()).unwrap());

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store
                .append(make_submission(&format!("item-{i}")))
                .await
                .unwrap()
                .sequence_index()
        }));
    }
    let mut seqs = Vec::new();
    for handle in handles {
        seqs.push(handle.await.unwrap());
    }
    seqs.sort_unstable();
    seqs.dedup();

    assert_eq!(seqs.len(), 20);
    assert_eq!(store.count().await.unwrap(), 20);
    drop(store);

    let reopened = BacklogStore::open(dir.path()).unwrap();
    assert_eq!(reopened.count().await.unwrap(), 20);
}

#[tokio::test]
async fn append_fails_when_storage_is_gone() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let store = BacklogStore::open(&data_dir).unwrap();
    store.append(make_submission("kept")).await.unwrap();

    std::fs::remove_dir_all(&data_dir).unwrap();

    let err = store.append(make_submission("lost")).await.unwrap_err();
    assert!(matches!(err, StorageError::Io(_)));
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn missing_image_file_is_reported_as_corruption() {
    let dir = tempdir().unwrap();
    {
        let store = BacklogStore::open(dir.path()).unwrap();
        let s = catalog_core::Submission::new(
            "pictured",
            Decimal::ONE,
            Decimal::ZERO,
            Category::Shoes,
            Some(vec![9, 9]),
        )
        .unwrap();
        store.append(s).await.unwrap();
    }
    std::fs::remove_dir_all(dir.path().join("images")).unwrap();
    std::fs::create_dir_all(dir.path().join("images")).unwrap();

    let err = BacklogStore::open(dir.path()).err().expect("open should fail");
    assert!(matches!(err, StorageError::Corrupted(_)));
}

#[tokio::test]
async fn compaction_after_many_removals_keeps_state() {
    let dir = tempdir().unwrap();
    let store = BacklogStore::open(dir.path()).unwrap();

    let mut entries = Vec::new();
    for i in 0..(COMPACT_AFTER_REMOVALS + 2) {
        entries.push(store.append(make_submission(&format!("n{i}"))).await.unwrap());
    }
    for entry in &entries[..COMPACT_AFTER_REMOVALS] {
        store.remove(entry.sequence_index()).await.unwrap();
    }

    let log = std::fs::read_to_string(store.log_path()).unwrap();
    assert!(!log.contains("\"remove\""));
    drop(store);

    let reopened = BacklogStore::open(dir.path()).unwrap();
    let expected = vec![
        format!("n{}", COMPACT_AFTER_REMOVALS),
        format!("n{}", COMPACT_AFTER_REMOVALS + 1),
    ];
    assert_eq!(names(&reopened.list_pending().await.unwrap()), expected);
}

#[tokio::test]
async fn second_store_on_same_dir_is_locked_out() {
    let dir = tempdir().unwrap();
    let first = BacklogStore::open(dir.path()).unwrap();
    first.append(make_submission("from first")).await.unwrap();

    let err = BacklogStore::open(dir.path()).err().expect("second open should fail");
    assert!(matches!(err, StorageError::Locked { .. }), "got {err:?}");

    drop(first);
    let second = BacklogStore::open(dir.path()).unwrap();
    assert_eq!(names(&second.list_pending().await.unwrap()), vec!["from first"]);
}

#[tokio::test]
async fn image_entry_removed_then_reopened_twice() {
    let dir = tempdir().unwrap();
    {
        let store = BacklogStore::open(dir.path()).unwrap();
        let s = catalog_core::Submission::new(
            "pictured",
            Decimal::ONE,
            Decimal::ZERO,
            Category::Shoes,
            Some(vec![0xFF, 0xD8]),
        )
        .unwrap();
        let entry = store.append(s).await.unwrap();
        store.remove(entry.sequence_index()).await.unwrap();
    }

    for _ in 0..2 {
        let store = BacklogStore::open(dir.path()).unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}

#[tokio::test]
async fn torn_final_record_is_dropped_on_open() {
    let dir = tempdir().unwrap();
    let log_path = {
        let store = BacklogStore::open(dir.path()).unwrap();
        store.append(make_submission("a")).await.unwrap();
        store.append(make_submission("b")).await.unwrap();
        store.log_path().to_path_buf()
    };
    let mut raw = std::fs::read(&log_path).unwrap();
    raw.extend_from_slice(b"{\"kind\":\"append\",\"seq\":2,\"ent");
    std::fs::write(&log_path, raw).unwrap();

    {
        let store = BacklogStore::open(dir.path()).unwrap();
        assert_eq!(names(&store.list_pending().await.unwrap()), vec!["a", "b"]);
        let c = store.append(make_submission("c")).await.unwrap();
        assert_eq!(c.sequence_index(), 2);
    }

    let store = BacklogStore::open(dir.path()).unwrap();
    assert_eq!(
        names(&store.list_pending().await.unwrap()),
        vec!["a", "b", "c"]
    );
}

#[tokio::test]
async fn failed_append_does_not_reuse_its_index() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let store = BacklogStore::open(&data_dir).unwrap();
    let first = store.append(make_submission("first")).await.unwrap();

    std::fs::remove_dir_all(&data_dir).unwrap();
    store.append(make_submission("lost")).await.unwrap_err();
    std::fs::create_dir_all(data_dir.join("images")).unwrap();

    let next = store.append(make_submission("next")).await.unwrap();
    assert_eq!(next.sequence_index(), first.sequence_index() + 2);
}
