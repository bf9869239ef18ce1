//! Conformance test suite for [`ArchiveBackend`] implementations.
//!
//! This module provides async test functions that validate whether an
//! [`ArchiveBackend`] implementation satisfies the trait contract. Every
//! archive, in-memory, on-disk or third-party, can run the same suite.
//!
//! # Usage
//!
//! Enable the `testutil` feature and call each conformance function with
//! a fresh archive instance:
//!
//! ```no_run
//! use secretaudit_storage::conformance;
//! use secretaudit_storage::MemoryArchive;
//!
//! #[tokio::test]
//! async fn read_missing_returns_not_found() {
//!     conformance::read_missing_returns_not_found(&MemoryArchive::new()).await;
//! }
//! ```
//!
//! # Test Categories
//!
//! | Category | Functions | Contract aspect |
//! |----------|-----------|-----------------|
//! | Read/write | 5 tests | Artifact format, ordering, overwrite, isolation |
//! | Presence | 1 test | `exists` agrees with `write` |
//! | Concurrent | 1 test | Parallel writes to distinct reports |
//! | Health | 1 test | `health_check` on a fresh archive |

use std::sync::Arc;

use crate::{
    assert_not_found,
    backend::{ArchiveBackend, decode_report},
    testutil::sample_entries,
    types::ReportId,
};

// ============================================================================
// Read/write
// ============================================================================

/// `read_raw` for a report that was never written returns `NotFound`.
pub async fn read_missing_returns_not_found<B: ArchiveBackend>(archive: &B) {
    let result = archive.read_raw(&ReportId::generate()).await;
    assert_not_found!(result, "unwritten report");
}

/// A written report reads back as a JSON array of its entries.
pub async fn write_then_read_returns_json_array<B: ArchiveBackend>(archive: &B) {
    let id = ReportId::generate();
    let entries = sample_entries(3);
    archive.write(&id, &entries).await.expect("write should succeed");

    let raw = archive.read_raw(&id).await.expect("read_raw should succeed");
    let value: serde_json::Value = serde_json::from_slice(&raw).expect("artifact must be JSON");
    assert_eq!(value.as_array().map(Vec::len), Some(3), "artifact must be a 3-element array");
    assert_eq!(decode_report(&raw).expect("decode"), entries);

    let empty = ReportId::generate();
    archive.write(&empty, &[]).await.expect("write empty report");
    assert_eq!(archive.read_raw(&empty).await.expect("read empty").as_ref(), b"[]");
}

/// Entries are persisted in exactly the order they were given.
pub async fn write_preserves_entry_order<B: ArchiveBackend>(archive: &B) {
    let id = ReportId::generate();
    let mut entries = sample_entries(8);
    entries.reverse();
    archive.write(&id, &entries).await.expect("write");

    let decoded = decode_report(&archive.read_raw(&id).await.expect("read")).expect("decode");
    let names: Vec<&str> = decoded.iter().map(|e| e.metadata.name.as_str()).collect();
    let expected: Vec<&str> = entries.iter().map(|e| e.metadata.name.as_str()).collect();
    assert_eq!(names, expected, "entry order must be preserved");
}

/// A second write for the same report replaces the first artifact.
pub async fn write_overwrites_existing<B: ArchiveBackend>(archive: &B) {
    let id = ReportId::generate();
    archive.write(&id, &sample_entries(4)).await.expect("first write");
    archive.write(&id, &sample_entries(1)).await.expect("second write");

    let decoded = decode_report(&archive.read_raw(&id).await.expect("read")).expect("decode");
    assert_eq!(decoded, sample_entries(1), "second write must replace the first");
}

/// Artifacts of different reports never bleed into each other.
pub async fn distinct_ids_are_isolated<B: ArchiveBackend>(archive: &B) {
    let a = ReportId::generate();
    let b = ReportId::generate();
    archive.write(&a, &sample_entries(1)).await.expect("write a");
    archive.write(&b, &sample_entries(2)).await.expect("write b");

    let decoded_a = decode_report(&archive.read_raw(&a).await.expect("read a")).expect("decode a");
    let decoded_b = decode_report(&archive.read_raw(&b).await.expect("read b")).expect("decode b");
    assert_eq!(decoded_a.len(), 1);
    assert_eq!(decoded_b.len(), 2);
}

// ============================================================================
// Presence
// ============================================================================

/// `exists` is false before and true after a write.
pub async fn exists_tracks_writes<B: ArchiveBackend>(archive: &B) {
    let id = ReportId::generate();
    assert!(!archive.exists(&id).await.expect("exists before write"));
    archive.write(&id, &sample_entries(1)).await.expect("write");
    assert!(archive.exists(&id).await.expect("exists after write"));
}

// ============================================================================
// Concurrent access
// ============================================================================

/// Concurrent writes to distinct reports all land intact.
///
/// Requires `B: 'static` so the archive can be shared across spawned tasks
/// via `Arc`.
pub async fn concurrent_writes_distinct_ids<B: ArchiveBackend + 'static>(archive: Arc<B>) {
    let ids: Vec<ReportId> = (0..32).map(|_| ReportId::generate()).collect();

    let mut handles = Vec::new();
    for (i, id) in ids.iter().copied().enumerate() {
        let archive = Arc::clone(&archive);
        handles.push(tokio::spawn(async move {
            archive.write(&id, &sample_entries(i % 5)).await.expect("concurrent write");
        }));
    }
    for handle in handles {
        handle.await.expect("task join");
    }

    for (i, id) in ids.iter().enumerate() {
        let raw = archive.read_raw(id).await.expect("read after concurrent writes");
        let decoded = decode_report(&raw).expect("artifact must not be torn");
        assert_eq!(decoded, sample_entries(i % 5), "report {id} has wrong contents");
    }
}

// ============================================================================
// Health
// ============================================================================

/// `health_check` succeeds on a freshly constructed archive.
pub async fn health_check_succeeds<B: ArchiveBackend>(archive: &B) {
    let result = archive.health_check().await;
    assert!(result.is_ok(), "fresh archive should be healthy: {result:?}");
}

// ============================================================================
// Convenience runner
// ============================================================================

/// Runs the full conformance suite, building a fresh archive per test.
///
/// ```no_run
/// use secretaudit_storage::conformance;
/// use secretaudit_storage::MemoryArchive;
///
/// #[tokio::test(flavor = "multi_thread")]
/// async fn memory_archive_conformance() {
///     conformance::run_all(MemoryArchive::new).await;
/// }
/// ```
pub async fn run_all<B, F>(make_archive: F)
where
    B: ArchiveBackend + 'static,
    F: Fn() -> B,
{
    read_missing_returns_not_found(&make_archive()).await;
    write_then_read_returns_json_array(&make_archive()).await;
    write_preserves_entry_order(&make_archive()).await;
    write_overwrites_existing(&make_archive()).await;
    distinct_ids_are_isolated(&make_archive()).await;
    exists_tracks_writes(&make_archive()).await;
    concurrent_writes_distinct_ids(Arc::new(make_archive())).await;
    health_check_succeeds(&make_archive()).await;
}
