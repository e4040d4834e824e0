//! Progress-callback trait for per-document and per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline processes each page. The CLI drives its progress
//! bar from these; library users can forward them anywhere.
//!
//! # Example
//!
//! ```rust
//! use pdf_diagrams::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     diagrams: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, _page: usize, _total: usize, diagrams: usize) {
//!         self.diagrams.fetch_add(diagrams, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { diagrams: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extraction pipeline as it processes documents and pages.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. With `concurrency > 1` the page methods may be
/// called from several tasks at once.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once per document, after its page count is known.
    ///
    /// # Arguments
    /// * `document`    — document name (source file stem)
    /// * `total_pages` — number of pages that will be processed
    fn on_document_start(&self, document: &str, total_pages: usize) {
        let _ = (document, total_pages);
    }

    /// Called just before a page is vectorised.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page finished without a page-level failure.
    ///
    /// # Arguments
    /// * `diagrams` — diagrams successfully exported from the page (may be 0)
    fn on_page_complete(&self, page_num: usize, total_pages: usize, diagrams: usize) {
        let _ = (page_num, total_pages, diagrams);
    }

    /// Called when a page could not be processed at all.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called when a single diagram failed to crop or autofit.
    fn on_diagram_error(&self, page_num: usize, diagram: usize, error: &str) {
        let _ = (page_num, diagram, error);
    }

    /// Called once per document after every page was attempted and the
    /// working directory was cleaned up.
    ///
    /// # Arguments
    /// * `pages_ok` — pages without a page-level failure
    /// * `diagrams` — diagrams exported across the document
    fn on_document_complete(&self, document: &str, pages_ok: usize, diagrams: usize) {
        let _ = (document, pages_ok, diagrams);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        diagram_errors: AtomicUsize,
        diagrams: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page_num: usize, _total_pages: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, diagrams: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.diagrams.fetch_add(diagrams, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_diagram_error(&self, _page_num: usize, _diagram: usize, _error: &str) {
            self.diagram_errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_document_start("doc", 5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 2);
        cb.on_page_error(2, 5, "pdftocairo exited with status 1");
        cb.on_diagram_error(3, 1, "crop failed");
        cb.on_document_complete("doc", 4, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_page_start(1, 3);
        tracker.on_page_complete(1, 3, 2);
        tracker.on_page_start(2, 3);
        tracker.on_diagram_error(2, 1, "autofit timed out");
        tracker.on_page_complete(2, 3, 0);
        tracker.on_page_start(3, 3);
        tracker.on_page_error(3, 3, "conversion failed");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.diagram_errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.diagrams.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_document_start("doc", 10);
        cb.on_page_complete(1, 10, 1);
    }
}
