//! Result types produced by a run.

use crate::error::{ImageError, RecognitionError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The outcome of processing one image.
///
/// Exactly one exists per listed image, successful or not. A failed image
/// has an empty `text` and its `error` set; it never aborts the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerImageResult {
    /// Position of the image in the sorted listing (0-based).
    pub ordinal: usize,
    /// File name of the image.
    pub name: String,
    /// Date found at the top of the transcription, if any.
    pub date: Option<String>,
    /// Cleaned transcription. Empty when `error` is set.
    pub text: String,
    /// Summed cost of every recognition attempt for this image, in dollars.
    pub cost: f64,
    /// Recognition attempts made. Zero when the image never reached recognition.
    pub attempts: u32,
    /// Wall-clock time spent on this image (load + resize + recognise).
    pub duration_ms: u64,
    /// Set when the image failed.
    pub error: Option<ImageError>,
}

impl PerImageResult {
    /// Result for an image that was never started because the run was cancelled.
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            ordinal: 0,
            name: name.into(),
            date: None,
            text: String::new(),
            cost: 0.0,
            attempts: 0,
            duration_ms: 0,
            error: Some(ImageError::Cancelled),
        }
    }

    /// `true` when the image produced a transcription.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// `true` when cancellation stopped this image before it finished.
    pub fn was_cancelled(&self) -> bool {
        matches!(
            self.error,
            Some(ImageError::Cancelled)
                | Some(ImageError::Recognition(RecognitionError::Cancelled))
        )
    }
}

/// Aggregate statistics over every [`PerImageResult`] of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Images processed, successful or not.
    pub processed_count: usize,
    /// Images whose result carries an error.
    pub failed_count: usize,
    /// Sum of every image's cost, in dollars.
    pub total_cost: f64,
    /// `total_cost / processed_count`.
    pub cost_per_image: f64,
    /// Sum of every image's recognition attempts.
    pub total_attempts: u64,
    /// `total_attempts / processed_count`.
    pub attempts_per_image: f64,
    /// Wall-clock time of the whole run.
    pub total_duration_ms: u64,
    /// `total_duration_ms / processed_count`.
    pub time_per_image_ms: f64,
}

impl RunSummary {
    /// Compute the summary. Averages are zero when `results` is empty.
    pub fn from_results(results: &[PerImageResult], wall_time: Duration) -> Self {
        let processed_count = results.len();
        let failed_count = results.iter().filter(|r| !r.is_success()).count();
        let total_cost: f64 = results.iter().map(|r| r.cost).sum();
        let total_attempts: u64 = results.iter().map(|r| r.attempts as u64).sum();
        let total_duration_ms = wall_time.as_millis() as u64;

        let per_image = |total: f64| {
            if processed_count == 0 {
                0.0
            } else {
                total / processed_count as f64
            }
        };

        Self {
            processed_count,
            failed_count,
            total_cost,
            cost_per_image: per_image(total_cost),
            total_attempts,
            attempts_per_image: per_image(total_attempts as f64),
            total_duration_ms,
            time_per_image_ms: per_image(total_duration_ms as f64),
        }
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub summary: RunSummary,
    /// The transcript exactly as it was saved.
    pub transcript: String,
    /// Per-image results in listing order.
    pub results: Vec<PerImageResult>,
}
