//! Recognition: one logical transcription call with retry and cost bookkeeping.
//!
//! [`RecognitionClient`] wraps a [`RecognitionTransport`] and owns every
//! policy decision around it. The transport makes single attempts; this
//! module decides whether to try again, how long to wait, what the call
//! cost and whether an answer was really a transcription.
//!
//! ## Retry Strategy
//!
//! Transport errors, non-success statuses and refusals all consume one
//! attempt and are retried up to [`RetryPolicy::max_attempts`]. The wait
//! before retry `n` is `base * 2^(n-1)` capped at `max`, so with the defaults
//! (10 ms base, 50 ms cap) the sequence is 10 → 20 → 40 → 50 ms. A 401 is
//! terminal: retrying with the same key cannot succeed.
//!
//! ## Cost
//!
//! Every attempt that reports usage is billed, including refusals and
//! attempts that are later retried. An attempt without usage costs nothing.

use crate::config::{Pricing, RetryPolicy};
use crate::error::RecognitionError;
use crate::pipeline::refusal::RefusalDetector;
use crate::provider::RecognitionTransport;
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The terminal outcome of [`RecognitionClient::recognize`].
///
/// `cost` and `attempts` are reported for failures as well as successes.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub outcome: Result<String, RecognitionError>,
    /// Summed cost of every attempt made, in dollars.
    pub cost: f64,
    /// Attempts made, including the one in flight when cancellation fired.
    pub attempts: u32,
}

/// Retrying, cost-tracking client around a [`RecognitionTransport`].
///
/// Cheap to clone; share one instance across all workers of a run.
#[derive(Clone)]
pub struct RecognitionClient {
    transport: Arc<dyn RecognitionTransport>,
    detector: Arc<dyn RefusalDetector>,
    retry: RetryPolicy,
    pricing: Pricing,
}

impl std::fmt::Debug for RecognitionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionClient")
            .field("transport", &self.transport)
            .field("retry", &self.retry)
            .field("pricing", &self.pricing)
            .finish_non_exhaustive()
    }
}

impl RecognitionClient {
    pub fn new(
        transport: Arc<dyn RecognitionTransport>,
        detector: Arc<dyn RefusalDetector>,
        retry: RetryPolicy,
        pricing: Pricing,
    ) -> Self {
        Self {
            transport,
            detector,
            retry,
            pricing,
        }
    }

    /// Transcribe one image.
    ///
    /// Never panics and never returns early without cost: the returned
    /// [`Recognition`] always carries what was spent. Cancelling `cancel`
    /// aborts an in-flight attempt or backoff wait immediately with
    /// [`RecognitionError::Cancelled`].
    pub async fn recognize(&self, image: &[u8], cancel: &CancellationToken) -> Recognition {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut cost = 0.0;
        let mut attempts = 0u32;
        let mut last_err: Option<RecognitionError> = None;

        let cancelled = |cost: f64, attempts: u32| Recognition {
            outcome: Err(RecognitionError::Cancelled),
            cost,
            attempts,
        };

        while attempts < max_attempts {
            if attempts > 0 {
                let backoff = self.retry.delay_for(attempts);
                warn!(
                    "Retry {}/{} after {:?}",
                    attempts,
                    max_attempts - 1,
                    backoff
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return cancelled(cost, attempts),
                    _ = sleep(backoff) => {}
                }
            } else if cancel.is_cancelled() {
                return cancelled(cost, attempts);
            }

            attempts += 1;
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return cancelled(cost, attempts),
                r = self.transport.complete(image) => r,
            };

            match response {
                Ok(completion) => {
                    if let Some(usage) = completion.usage {
                        cost += self.pricing.cost(usage.input_tokens, usage.output_tokens);
                        debug!(
                            "Attempt {}: {} input tokens, {} output tokens",
                            attempts, usage.input_tokens, usage.output_tokens
                        );
                    }
                    if self.detector.is_refusal(&completion.text) {
                        warn!("Attempt {} was refused by the model", attempts);
                        last_err = Some(RecognitionError::RefusalDetected {
                            text: completion.text,
                        });
                        continue;
                    }
                    return Recognition {
                        outcome: Ok(completion.text),
                        cost,
                        attempts,
                    };
                }
                Err(e) if e.is_unauthorized() => {
                    warn!("Attempt {} unauthorized, not retrying", attempts);
                    return Recognition {
                        outcome: Err(RecognitionError::InvalidCredential),
                        cost,
                        attempts,
                    };
                }
                Err(e) => {
                    warn!("Attempt {} failed: {}", attempts, e);
                    last_err = Some(e);
                }
            }
        }

        Recognition {
            outcome: Err(RecognitionError::MaxAttemptsExceeded {
                attempts,
                last: Box::new(last_err.unwrap_or_else(|| {
                    RecognitionError::Transport("no attempt recorded".into())
                })),
            }),
            cost,
            attempts,
        }
    }

    /// One-shot credential check; never retried.
    pub async fn validate_credential(&self) -> Result<(), RecognitionError> {
        self.transport.validate_credential().await
    }
}
