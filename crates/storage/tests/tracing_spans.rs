//! Integration test verifying that `#[instrument]` annotations produce
//! the expected spans on archive operations.

#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use secretaudit_storage::{
    ArchiveBackend, FileArchive, FileArchiveConfig, MemoryArchive, ReportId,
};
use tracing::Subscriber;
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};

// ---------------------------------------------------------------------------
// Collecting layer: records span names as they are created
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SpanCollector {
    spans: Arc<Mutex<Vec<String>>>,
}

impl<S> tracing_subscriber::Layer<S> for SpanCollector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }
}

fn assert_span(spans: &Arc<Mutex<Vec<String>>>, name: &str) {
    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == name), "expected a '{name}' span, got: {recorded:?}");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_archive_write_creates_span() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let archive = MemoryArchive::new();
    archive.write(&ReportId::generate(), &[]).await.expect("write should succeed");

    assert_span(&spans, "write");
}

#[tokio::test]
async fn memory_archive_read_raw_creates_span() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let archive = MemoryArchive::new();
    let _ = archive.read_raw(&ReportId::generate()).await;

    assert_span(&spans, "read_raw");
}

#[tokio::test]
async fn memory_archive_health_check_creates_span() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let archive = MemoryArchive::new();
    archive.health_check().await.expect("health_check should succeed");

    assert_span(&spans, "health_check");
}

#[tokio::test]
async fn file_archive_write_and_read_create_spans() {
    let collector = SpanCollector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let dir = tempfile::TempDir::new().expect("tempdir");
    let config = FileArchiveConfig::builder().root(dir.path()).build().expect("valid config");
    let archive = FileArchive::new(config);
    let id = ReportId::generate();
    archive.write(&id, &[]).await.expect("write should succeed");
    archive.read_raw(&id).await.expect("read should succeed");

    assert_span(&spans, "write");
    assert_span(&spans, "read_raw");
}
