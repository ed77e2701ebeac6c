//! Progress-callback trait for per-page ingestion events.
//!
//! Inject an [`Arc<dyn IngestProgressCallback>`] via
//! [`crate::config::IngestConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through a document. Callers can forward them
//! to a progress bar, a WebSocket or a job table without the library knowing
//! how the host application communicates.
//!
//! # Example
//!
//! ```rust
//! use magazine_ingest::{IngestConfig, IngestProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl IngestProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("page {page_num} ready ({done}/{total_pages})");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: AtomicUsize::new(0),
//! });
//!
//! let config = IngestConfig::builder()
//!     .progress_callback(counter as Arc<dyn IngestProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::ops::RangeInclusive;
use std::sync::Arc;

/// Called by the ingestion pipeline as it processes each page.
///
/// Page events within a batch may arrive concurrently from different
/// threads, in any order. All methods default to no-ops.
pub trait IngestProgressCallback: Send + Sync {
    /// Called once the document is validated and archived.
    fn on_ingest_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a batch is scheduled.
    ///
    /// # Arguments
    /// * `batch_index` — 0-indexed batch number
    /// * `pages`       — 1-indexed page numbers in this batch
    fn on_batch_start(&self, batch_index: usize, pages: RangeInclusive<usize>) {
        let _ = (batch_index, pages);
    }

    /// Called when a page's final image is written and its raw bitmap removed.
    fn on_page_complete(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page fails to rasterise or re-encode.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after the last batch, only when a manifest is returned.
    ///
    /// # Arguments
    /// * `total_pages`   — page count of the PDF
    /// * `success_count` — pages present in the manifest
    fn on_ingest_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressCallback;

impl IngestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::IngestConfig`].
pub type ProgressCallback = Arc<dyn IngestProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        completes: AtomicUsize,
        errors: AtomicUsize,
        batches: Mutex<Vec<RangeInclusive<usize>>>,
    }

    impl IngestProgressCallback for TrackingCallback {
        fn on_batch_start(&self, _batch_index: usize, pages: RangeInclusive<usize>) {
            self.batches.lock().unwrap().push(pages);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_ingest_start(5);
        cb.on_batch_start(0, 1..=5);
        cb.on_page_complete(1, 5);
        cb.on_page_error(2, 5, "some error");
        cb.on_ingest_complete(5, 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_batch_start(0, 1..=2);
        tracker.on_page_complete(1, 2);
        tracker.on_page_error(2, 2, "encoder refused");

        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(*tracker.batches.lock().unwrap(), vec![1..=2]);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_ingest_start(10);
        cb.on_page_complete(1, 10);
    }
}
