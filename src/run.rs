//! Run orchestration: every image in a directory to one saved transcript.
//!
//! [`Orchestrator::run`] drives the whole pipeline:
//!
//! ```text
//! validate key ──▶ list ──▶ ┌ load ─▶ resize ─▶ recognize ─▶ clean ─▶ date ┐ ──▶ format ──▶ save
//!                           └──────────── ≤ concurrency images in flight ──┘
//! ```
//!
//! Images complete in any order; each result goes into the slot of its
//! listing ordinal, and the transcript is always assembled in listing order.
//! A failed image never stops its siblings. Only run-level problems (bad
//! key, empty directory, unwritable output, cancellation) return `Err`, and
//! none of them leaves a transcript behind.

use crate::config::RunConfig;
use crate::error::{ImageError, OcrError};
use crate::output::{PerImageResult, RunReport, RunSummary};
use crate::pipeline::input::{ImageDirectory, ImageStore};
use crate::pipeline::llm::RecognitionClient;
use crate::pipeline::postprocess::clean_transcription;
use crate::pipeline::refusal::PhraseRefusalDetector;
use crate::pipeline::resize::resize_image;
use crate::pipeline::transcript::{extract_date, format_transcript};
use crate::provider::OpenAiTransport;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Coordinates store, resizer and recognition client for one run.
pub struct Orchestrator {
    client: RecognitionClient,
    store: Arc<dyn ImageStore>,
    config: RunConfig,
}

impl Orchestrator {
    pub fn new(client: RecognitionClient, store: Arc<dyn ImageStore>, config: RunConfig) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    /// Wire up the local directory store and the OpenAI-compatible transport.
    ///
    /// # Errors
    /// [`OcrError::InvalidConfig`] when no API key is available.
    pub fn from_config(config: &RunConfig) -> Result<Self, OcrError> {
        let transport = OpenAiTransport::from_config(config)?;
        let client = RecognitionClient::new(
            Arc::new(transport),
            Arc::new(PhraseRefusalDetector),
            config.retry,
            config.pricing,
        );
        let store = ImageDirectory::new(&config.input_dir, config.resolved_output_path());
        Ok(Self::new(client, Arc::new(store), config.clone()))
    }

    /// Transcribe every image and save the transcript.
    ///
    /// # Returns
    /// `Ok(RunReport)` once the transcript is saved, even if some images
    /// failed (check `report.summary.failed_count`).
    ///
    /// # Errors
    /// Returns `Err(OcrError)` only for run-level failures:
    /// - the key is rejected or the credential check fails
    /// - the directory is missing or holds no images
    /// - the transcript cannot be saved ([`OcrError::ProcessingFailed`])
    /// - `cancel` fired ([`OcrError::Cancelled`])
    /// - the config violates a builder constraint ([`OcrError::InvalidConfig`])
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunReport, OcrError> {
        // A zero in-flight cap would never admit an image.
        self.config.validate()?;

        let started = Instant::now();
        let location = self.store.location();
        info!("Starting run: {}", location.display());

        // ── Step 1: Validate credential ──────────────────────────────────
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(OcrError::Cancelled { completed: 0, total: 0 });
            }
            checked = self.client.validate_credential() => checked?,
        }
        debug!("Credential accepted");

        // ── Step 2: List images ──────────────────────────────────────────
        let names = self.store.list_images().await?;
        if names.is_empty() {
            return Err(OcrError::NoImagesFound { path: location });
        }
        let total = names.len();

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_start(total);
        }

        // ── Step 3: Process images, at most `concurrency` in flight ──────
        let mut slots: Vec<Option<PerImageResult>> = vec![None; total];
        let mut completed = 0usize;
        let mut in_flight = stream::iter(
            names
                .into_iter()
                .enumerate()
                .map(|(ordinal, name)| self.process_image(ordinal, name, cancel)),
        )
        .buffer_unordered(self.config.concurrency);

        while let Some(result) = in_flight.next().await {
            completed += 1;
            if let Some(ref cb) = self.config.progress_callback {
                cb.on_image_complete(completed, total, &result);
            }
            let ordinal = result.ordinal;
            slots[ordinal] = Some(result);
        }

        let results: Vec<PerImageResult> = slots
            .into_iter()
            .collect::<Option<_>>()
            .ok_or_else(|| OcrError::Internal("an image produced no result".into()))?;

        if cancel.is_cancelled() {
            let finished = results.iter().filter(|r| !r.was_cancelled()).count();
            warn!("Run cancelled after {}/{} images", finished, total);
            return Err(OcrError::Cancelled {
                completed: finished,
                total,
            });
        }

        for failed in results.iter().filter(|r| !r.is_success()) {
            if let Some(ref e) = failed.error {
                warn!("{}: {}", failed.name, e);
            }
        }

        // ── Step 4: Format and save ──────────────────────────────────────
        let transcript = format_transcript(&results, self.config.start_date.as_deref());
        self.store
            .save_transcript(&transcript)
            .await
            .map_err(|e| OcrError::ProcessingFailed(Box::new(e)))?;

        let summary = RunSummary::from_results(&results, started.elapsed());
        info!(
            "Run complete: {} images ({} failed), {} attempts, ${:.4}, {}ms",
            summary.processed_count,
            summary.failed_count,
            summary.total_attempts,
            summary.total_cost,
            summary.total_duration_ms
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_run_complete(&summary);
        }

        Ok(RunReport {
            summary,
            transcript,
            results,
        })
    }

    /// Load, resize and recognise one image. Always yields a result.
    async fn process_image(
        &self,
        ordinal: usize,
        name: String,
        cancel: &CancellationToken,
    ) -> PerImageResult {
        if cancel.is_cancelled() {
            return PerImageResult {
                ordinal,
                ..PerImageResult::skipped(name)
            };
        }

        let start = Instant::now();
        let (outcome, cost, attempts) = self.transcribe(&name, cancel).await;

        let mut result = PerImageResult {
            ordinal,
            name,
            date: None,
            text: String::new(),
            cost,
            attempts,
            duration_ms: 0,
            error: None,
        };
        match outcome {
            Ok(raw) => {
                result.text = clean_transcription(&raw);
                result.date = extract_date(&result.text);
            }
            Err(e) => result.error = Some(e),
        }
        result.duration_ms = start.elapsed().as_millis() as u64;

        debug!(
            "Image {} ({}): {} attempts, ${:.4}, {}ms",
            ordinal + 1,
            result.name,
            result.attempts,
            result.cost,
            result.duration_ms
        );
        result
    }

    async fn transcribe(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> (Result<String, ImageError>, f64, u32) {
        let bytes = match self.store.load_image(name).await {
            Ok(b) => b,
            Err(e) => return (Err(e), 0.0, 0),
        };

        // Decoding and resampling are CPU-bound.
        let max = i64::from(self.config.max_dimension);
        let resized = match tokio::task::spawn_blocking(move || resize_image(bytes, max)).await {
            Ok(Ok(b)) => b,
            Ok(Err(e)) => return (Err(e), 0.0, 0),
            Err(e) => return (Err(worker_failure(e)), 0.0, 0),
        };

        let recognition = self.client.recognize(&resized, cancel).await;
        (
            recognition.outcome.map_err(ImageError::from),
            recognition.cost,
            recognition.attempts,
        )
    }
}

fn worker_failure(err: tokio::task::JoinError) -> ImageError {
    let detail = if err.is_panic() {
        format!("resize task panicked: {err}")
    } else {
        format!("resize task aborted: {err}")
    };
    ImageError::WorkerFailed { detail }
}

/// Run the default pipeline for `config`: local directory in, transcript out.
///
/// This is the primary entry point for the library.
pub async fn run_once(config: &RunConfig, cancel: &CancellationToken) -> Result<RunReport, OcrError> {
    Orchestrator::from_config(config)?.run(cancel).await
}

/// Synchronous wrapper around [`run_once`].
///
/// Creates a temporary tokio runtime internally; the run cannot be cancelled.
pub fn run_blocking(config: &RunConfig) -> Result<RunReport, OcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_once(config, &CancellationToken::new()))
}
