//! # edgequake-img2txt
//!
//! Transcribe a directory of page images into one ordered, dated text file
//! using Vision Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Classic OCR engines do well on print and poorly on handwriting. Journals,
//! letters and notebooks photographed page by page read far better through a
//! VLM, but a folder of hundreds of scans needs more than a loop around an
//! API call: bounded parallelism, retries that stay cheap, a cost ledger, and
//! a transcript that comes out in page order with every entry dated.
//!
//! ## Pipeline Overview
//!
//! ```text
//! directory
//!  │
//!  ├─ 1. Validate  one-shot credential check (fail fast on a bad key)
//!  ├─ 2. List      jpg/jpeg/png/gif/bmp/webp, sorted by name
//!  ├─ 3. Resize    longest side ≤ 1500 px (CPU-bound, spawn_blocking)
//!  ├─ 4. VLM       ≤ N concurrent calls, 5 attempts each, refusals retried
//!  ├─ 5. Polish    fence / line-ending / invisible-char cleanup
//!  ├─ 6. Date      first date in the top five lines, carried forward
//!  └─ 7. Output    "---" separated transcript + cost / attempt summary
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_img2txt::{run_once, RunConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from OPENAI_API_KEY
//!     let config = RunConfig::builder()
//!         .input_dir("scans/2024")
//!         .start_date("Sunday, December 31, 2023")
//!         .build()?;
//!     let report = run_once(&config, &CancellationToken::new()).await?;
//!     eprintln!(
//!         "{} images, ${:.4} total, {:.2} attempts/image",
//!         report.summary.processed_count,
//!         report.summary.total_cost,
//!         report.summary.attempts_per_image,
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `img2txt` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-img2txt = { version = "0.1", default-features = false }
//! ```
//!
//! ## Plugging In
//!
//! [`Orchestrator::new`] takes any [`RecognitionTransport`] (wrapped in a
//! [`RecognitionClient`]) and any [`ImageStore`], so pages can come from
//! somewhere other than a local folder and recognition can target a service
//! other than the OpenAI chat-completions API.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod run;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Pricing, RetryPolicy, RunConfig, RunConfigBuilder};
pub use error::{ImageError, OcrError, RecognitionError};
pub use output::{PerImageResult, RunReport, RunSummary};
pub use pipeline::input::{ImageDirectory, ImageStore};
pub use pipeline::llm::{Recognition, RecognitionClient};
pub use pipeline::refusal::{PhraseRefusalDetector, RefusalDetector};
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use provider::{Completion, OpenAiTransport, RecognitionTransport, Usage};
pub use run::{run_blocking, run_once, Orchestrator};
