//! Progress-callback trait for per-card and per-page pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as cards are fetched and pages are saved.
//!
//! # Example
//!
//! ```rust
//! use mgproxy::{PipelineConfig, PipelineProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter {
//!     saved: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for PageCounter {
//!     fn on_page_saved(&self, page_number: usize, path: &Path, cards: usize) {
//!         self.saved.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_number}: {cards} cards → {}", path.display());
//!     }
//! }
//!
//! let counter = Arc::new(PageCounter { saved: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::{CardError, PageError};
use crate::report::ReportSnapshot;
use std::path::Path;
use std::sync::Arc;

/// Called by the pipeline as cards and pages move through it.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// Card events fire from fetch workers, `on_page_composed` from the compose
/// worker and page events from save workers, all concurrently. Protect any
/// shared mutable state with `Mutex` or atomics.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before any worker receives work.
    ///
    /// `total_items` counts only items with at least one copy; each of them
    /// later produces exactly one `on_card_fetched` or `on_card_error`.
    fn on_run_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called when a card image was resolved and decoded.
    fn on_card_fetched(&self, name: &str, copies: u32) {
        let _ = (name, copies);
    }

    /// Called when a card was dropped.
    fn on_card_error(&self, error: &CardError) {
        let _ = error;
    }

    /// Called after compose has handed a filled page to the save queue.
    ///
    /// The call happens only once the queue accepted the page, so a full
    /// canvas queue delays it.
    fn on_page_composed(&self, cards: usize) {
        let _ = cards;
    }

    /// Called when a page was written.
    fn on_page_saved(&self, page_number: usize, path: &Path, cards: usize) {
        let _ = (page_number, path, cards);
    }

    /// Called when a page could not be written.
    fn on_page_error(&self, error: &PageError) {
        let _ = error;
    }

    /// Called once after every stage has drained.
    fn on_run_complete(&self, snapshot: &ReportSnapshot) {
        let _ = snapshot;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        fetched: AtomicUsize,
        card_errors: AtomicUsize,
        saved_cards: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_card_fetched(&self, _name: &str, copies: u32) {
            self.fetched.fetch_add(copies as usize, Ordering::SeqCst);
        }

        fn on_card_error(&self, _error: &CardError) {
            self.card_errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_saved(&self, _page_number: usize, _path: &Path, cards: usize) {
            self.saved_cards.fetch_add(cards, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(3);
        cb.on_card_fetched("Swamp", 2);
        cb.on_card_error(&CardError::NotFound {
            card: "Swamp".into(),
            location: "/tmp".into(),
        });
        cb.on_page_composed(8);
        cb.on_page_saved(0, Path::new("/tmp/deck0.jpg"), 8);
        cb.on_page_error(&PageError::WriteFailed {
            page: 1,
            path: PathBuf::from("/tmp/deck1.jpg"),
            detail: "denied".into(),
        });
        cb.on_run_complete(&ReportSnapshot::default());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_card_fetched("Swamp", 2);
        tracker.on_card_fetched("Forest", 3);
        tracker.on_card_error(&CardError::ImageCorrupt {
            card: "Island".into(),
            detail: "truncated".into(),
        });
        tracker.on_page_saved(0, Path::new("deck0.jpg"), 5);

        assert_eq!(tracker.fetched.load(Ordering::SeqCst), 5);
        assert_eq!(tracker.card_errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.saved_cards.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn arc_dyn_callback_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn PipelineProgressCallback>();
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(1);
    }
}
