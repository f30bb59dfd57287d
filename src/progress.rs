//! Progress-callback trait for per-image run events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::RunConfigBuilder::progress_callback`] to receive events as
//! the pipeline finishes each image.
//!
//! Events are delivered from the single collecting loop of the orchestrator,
//! so `completed` never goes backwards between two calls. Images finish in
//! any order, so the `result` attached to consecutive events is not in
//! listing order.
//!
//! # Example
//!
//! ```rust
//! use edgequake_img2txt::{PerImageResult, RunConfig, RunProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl RunProgressCallback for Counter {
//!     fn on_image_complete(&self, completed: usize, total: usize, result: &PerImageResult) {
//!         self.0.store(completed, Ordering::SeqCst);
//!         eprintln!("{completed}/{total} {}", result.name);
//!     }
//! }
//!
//! let config = RunConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{PerImageResult, RunSummary};
use std::sync::Arc;

/// Called by the orchestrator as the run advances.
///
/// Implementations must be `Send + Sync`; stateful ones must protect their
/// state with `Mutex` or atomics. All methods default to no-ops.
pub trait RunProgressCallback: Send + Sync {
    /// Called once after listing, before any image is dispatched.
    fn on_run_start(&self, total: usize) {
        let _ = total;
    }

    /// Called once per image, successful or not.
    ///
    /// # Arguments
    /// * `completed`: images finished so far, including this one
    /// * `total`: images in the run
    /// * `result`: the finished image's result
    fn on_image_complete(&self, completed: usize, total: usize, result: &PerImageResult) {
        let _ = (completed, total, result);
    }

    /// Called once after the transcript has been saved.
    fn on_run_complete(&self, summary: &RunSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RunConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;
