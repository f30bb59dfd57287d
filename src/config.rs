//! Configuration types for a transcription run.
//!
//! All run behaviour is controlled through [`RunConfig`], built via its
//! [`RunConfigBuilder`]. A config is supplied once at run start and never
//! mutated afterwards, so it can be cloned freely into every worker.

use crate::error::OcrError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Configuration for one transcription run.
///
/// Built via [`RunConfig::builder()`] or using [`RunConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_img2txt::RunConfig;
///
/// let config = RunConfig::builder()
///     .input_dir("scans/2024")
///     .concurrency(4)
///     .start_date("Sunday, December 31, 2023")
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Clone)]
pub struct RunConfig {
    /// Directory holding the page images. Default: `.`
    pub input_dir: PathBuf,

    /// Transcript destination. Default: `output.txt`.
    ///
    /// A relative path is resolved against `input_dir`, so the transcript
    /// lands next to the images unless an absolute path is given.
    pub output_path: PathBuf,

    /// API key for the recognition service. Falls back to `OPENAI_API_KEY`.
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API. Default: `https://api.openai.com/v1`.
    pub api_base_url: String,

    /// Vision model identifier. Default: `gpt-4o`.
    pub model: String,

    /// Maximum number of images in flight at once. Default: 10.
    ///
    /// An image is in flight from the moment it starts loading until its
    /// recognition call returns.
    pub concurrency: usize,

    /// Date emitted for leading images that carry no date of their own.
    pub start_date: Option<String>,

    /// Longest-side cap applied before upload, in pixels. Default: 1500.
    pub max_dimension: u32,

    /// Maximum tokens the model may generate per image. Default: 4096.
    pub max_tokens: u32,

    /// Sampling temperature. Default: 0.1 (literal transcription).
    pub temperature: f32,

    /// Attempt cap and backoff schedule for each recognition call.
    pub retry: RetryPolicy,

    /// Per-token prices used to compute the cost of each attempt.
    pub pricing: Pricing,

    /// Per-request timeout for recognition calls in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Custom system prompt. If None, uses the built-in transcription prompt.
    pub system_prompt: Option<String>,

    /// Receives `(completed, total)` notifications as images finish.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_path: PathBuf::from("output.txt"),
            api_key: None,
            api_base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            concurrency: 10,
            start_date: None,
            max_dimension: 1500,
            max_tokens: 4096,
            temperature: 0.1,
            retry: RetryPolicy::default(),
            pricing: Pricing::default(),
            api_timeout_secs: 120,
            system_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("input_dir", &self.input_dir)
            .field("output_path", &self.output_path)
            .field("api_key", &self.api_key.as_deref().map(mask_key))
            .field("api_base_url", &self.api_base_url)
            .field("model", &self.model)
            .field("concurrency", &self.concurrency)
            .field("start_date", &self.start_date)
            .field("max_dimension", &self.max_dimension)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("retry", &self.retry)
            .field("pricing", &self.pricing)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RunProgressCallback>"),
            )
            .finish()
    }
}

impl RunConfig {
    /// Create a new builder for `RunConfig`.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder {
            config: Self::default(),
        }
    }

    /// Where the transcript will be written.
    pub fn resolved_output_path(&self) -> PathBuf {
        if self.output_path.is_absolute() {
            self.output_path.clone()
        } else {
            self.input_dir.join(&self.output_path)
        }
    }

    /// Check the constraints [`RunConfigBuilder::build`] enforces.
    ///
    /// Fields are public, so a config assembled as a struct literal is
    /// checked again when a run starts.
    pub fn validate(&self) -> Result<(), OcrError> {
        if self.concurrency == 0 {
            return Err(OcrError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if self.max_dimension == 0 {
            return Err(OcrError::InvalidConfig(
                "Max dimension must be ≥ 1 pixel".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(OcrError::InvalidConfig("Max attempts must be ≥ 1".into()));
        }
        if self.pricing.input_per_1k < 0.0 || self.pricing.output_per_1k < 0.0 {
            return Err(OcrError::InvalidConfig(
                "Token prices must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// The configured key, or `OPENAI_API_KEY` from the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()))
    }
}

/// Show the first four characters of a key and mask the rest.
pub fn mask_key(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    let hidden = key.chars().count().saturating_sub(4);
    format!("{}{}", visible, "*".repeat(hidden))
}

/// Builder for [`RunConfig`].
#[derive(Debug)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn input_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.input_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn output_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.output_path = path.as_ref().to_path_buf();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the in-flight cap. Zero is rejected by [`build`](Self::build).
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n;
        self
    }

    /// Set the carry-forward seed date. An empty string clears it.
    pub fn start_date(mut self, date: impl Into<String>) -> Self {
        let date = date.into();
        self.config.start_date = if date.trim().is_empty() {
            None
        } else {
            Some(date.trim().to_string())
        };
        self
    }

    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px;
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn pricing(mut self, pricing: Pricing) -> Self {
        self.config.pricing = pricing;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RunConfig, OcrError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Retry policy ─────────────────────────────────────────────────────────

/// Attempt cap and exponential backoff schedule for one recognition call.
///
/// The wait before retry `n` (1-based) is `base_delay_ms * 2^(n-1)`, capped
/// at `max_delay_ms`. There is never a wait before the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first. Default: 5.
    pub max_attempts: u32,
    /// First backoff delay. Default: 10 ms.
    pub base_delay_ms: u64,
    /// Backoff ceiling. Default: 50 ms.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 10,
            max_delay_ms: 50,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry (1 = the wait before the second attempt).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(32);
        let ms = self.base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(ms.min(self.max_delay_ms))
    }
}

// ── Pricing ──────────────────────────────────────────────────────────────

/// Linear per-token pricing, in US dollars per 1 000 tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            input_per_1k: 0.01,
            output_per_1k: 0.03,
        }
    }
}

impl Pricing {
    /// Cost of one attempt that reported the given token usage.
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_per_1k
            + (output_tokens as f64 / 1000.0) * self.output_per_1k
    }
}
