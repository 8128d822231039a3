//! Progress-callback trait for per-unit pipeline events.
//!
//! A *unit* is one PDF for the extractor and one (image, model) pair for
//! the captioner. Inject an [`Arc<dyn PipelineProgress>`] via
//! [`crate::config::ExtractConfigBuilder::progress_callback`] or
//! [`crate::config::CaptionConfigBuilder::progress_callback`] to receive
//! events as each unit is processed.
//!
//! # Example
//!
//! ```rust
//! use figscribe::{CaptionConfig, PipelineProgress};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl PipelineProgress for CountingCallback {
//!     fn on_unit_complete(&self, unit: &str, duration_ms: u64) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{unit} done in {duration_ms}ms");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = CaptionConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgress>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The pipeline stage an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// PDF → structured output + figures.
    Extract,
    /// Figure × model → caption report.
    Caption,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extract => f.write_str("extract"),
            Stage::Caption => f.write_str("caption"),
        }
    }
}

/// Called by the stages as they process each unit.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Units are processed one at a time, but the trait is
/// `Send + Sync` so implementations can be shared with other threads.
pub trait PipelineProgress: Send + Sync {
    /// Called once after the scan, before the first unit.
    ///
    /// # Arguments
    /// * `stage`       — the running stage
    /// * `total_units` — number of units that will be attempted
    fn on_stage_start(&self, stage: Stage, total_units: usize) {
        let _ = (stage, total_units);
    }

    /// Called just before a unit starts.
    fn on_unit_start(&self, unit: &str) {
        let _ = unit;
    }

    /// Called when a unit produced its outputs.
    fn on_unit_complete(&self, unit: &str, duration_ms: u64) {
        let _ = (unit, duration_ms);
    }

    /// Called when a unit failed. The stage continues with the next unit.
    fn on_unit_error(&self, unit: &str, error: &str) {
        let _ = (unit, error);
    }

    /// Called once after all units have been attempted.
    fn on_stage_complete(&self, stage: Stage, total_units: usize, success_count: usize) {
        let _ = (stage, total_units, success_count);
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgress;

impl PipelineProgress for NoopProgress {}

/// Convenience alias matching the type stored in the stage configs.
pub type ProgressCallback = Arc<dyn PipelineProgress>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        started_total: AtomicUsize,
        succeeded: AtomicUsize,
    }

    impl PipelineProgress for TrackingCallback {
        fn on_stage_start(&self, _stage: Stage, total_units: usize) {
            self.started_total.store(total_units, Ordering::SeqCst);
        }

        fn on_unit_start(&self, _unit: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unit_complete(&self, _unit: &str, _duration_ms: u64) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_unit_error(&self, _unit: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stage_complete(&self, _stage: Stage, _total_units: usize, success_count: usize) {
            self.succeeded.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgress;
        cb.on_stage_start(Stage::Extract, 2);
        cb.on_unit_start("a.pdf");
        cb.on_unit_complete("a.pdf", 12);
        cb.on_unit_error("b.pdf", "corrupt");
        cb.on_stage_complete(Stage::Extract, 2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_stage_start(Stage::Caption, 3);
        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);

        tracker.on_unit_start("fig-1 × granite3.2-vision");
        tracker.on_unit_complete("fig-1 × granite3.2-vision", 100);
        tracker.on_unit_start("fig-1 × llama3.2-vision");
        tracker.on_unit_error("fig-1 × llama3.2-vision", "connection refused");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);

        tracker.on_stage_complete(Stage::Caption, 2, 1);
        assert_eq!(tracker.succeeded.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::Extract.to_string(), "extract");
        assert_eq!(Stage::Caption.to_string(), "caption");
    }
}
