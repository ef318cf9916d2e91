//! Progress-callback trait for per-stage assembly events.
//!
//! Inject an [`Arc<dyn AssemblyProgressCallback>`] via
//! [`crate::config::AssemblyConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline works through each stage.
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a channel, a log sink, or a terminal progress bar without
//! the library knowing anything about how the host application communicates.
//! The trait is `Send + Sync` because section-level events fire from
//! concurrently running download and conversion tasks.

use std::sync::Arc;

use crate::error::AssemblyError;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Download each missing section PDF.
    Fetch,
    /// Convert each downloaded PDF to metadata-free PostScript.
    Normalize,
    /// Compute pagination and emit the pdfmark descriptor.
    Bookmarks,
    /// Combine everything into the final PDF.
    Merge,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Normalize => "normalize",
            Stage::Bookmarks => "bookmarks",
            Stage::Merge => "merge",
        };
        f.write_str(name)
    }
}

/// Called by the assembly pipeline as each stage progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Section-level methods may be called concurrently
/// from different tasks; implementations must protect shared mutable state
/// (e.g. with `Mutex` or `AtomicUsize`).
pub trait AssemblyProgressCallback: Send + Sync {
    /// Called once when a stage begins.
    ///
    /// `total` is the number of sections the stage still has to process —
    /// zero on a fully resumed run.
    fn on_stage_start(&self, stage: Stage, total: usize) {
        let _ = (stage, total);
    }

    /// Called when one section finishes successfully within a stage.
    fn on_section_complete(&self, stage: Stage, title: &str) {
        let _ = (stage, title);
    }

    /// Called when one section fails within a stage.
    ///
    /// The stage still runs every other section to completion before the
    /// error surfaces, so this may fire more than once per stage.
    fn on_section_error(&self, stage: Stage, title: &str, error: &AssemblyError) {
        let _ = (stage, title, error);
    }

    /// Called once when a stage finishes (successfully or not).
    fn on_stage_complete(&self, stage: Stage) {
        let _ = stage;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AssemblyProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AssemblyConfig`].
pub type ProgressCallback = Arc<dyn AssemblyProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        completes: AtomicUsize,
        errors: AtomicUsize,
        last_total: AtomicUsize,
    }

    impl AssemblyProgressCallback for TrackingCallback {
        fn on_stage_start(&self, _stage: Stage, total: usize) {
            self.last_total.store(total, Ordering::SeqCst);
        }

        fn on_section_complete(&self, _stage: Stage, _title: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_section_error(&self, _stage: Stage, _title: &str, _error: &AssemblyError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(Stage::Fetch, 5);
        cb.on_section_complete(Stage::Fetch, "05-10 Overview");
        cb.on_section_error(
            Stage::Fetch,
            "05-20 Limits",
            &AssemblyError::MalformedToc {
                reason: "x".into(),
            },
        );
        cb.on_stage_complete(Stage::Fetch);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            last_total: AtomicUsize::new(0),
        };

        tracker.on_stage_start(Stage::Normalize, 3);
        assert_eq!(tracker.last_total.load(Ordering::SeqCst), 3);

        tracker.on_section_complete(Stage::Normalize, "a");
        tracker.on_section_complete(Stage::Normalize, "b");
        tracker.on_section_error(
            Stage::Normalize,
            "c",
            &AssemblyError::SectionNotReady { title: "c".into() },
        );

        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stage_display_names() {
        assert_eq!(Stage::Fetch.to_string(), "fetch");
        assert_eq!(Stage::Merge.to_string(), "merge");
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start(Stage::Bookmarks, 0);
        cb.on_stage_complete(Stage::Bookmarks);
    }
}
