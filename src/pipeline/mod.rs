//! Pipeline stages for image-to-transcript conversion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different refusal heuristic or image store)
//! without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ resize ──▶ encode ──▶ llm ──▶ postprocess ──▶ transcript
//! (list/read) (≤1500px)  (data URL) (VLM)   (cleanup)       (dates, layout)
//! ```
//!
//! 1. [`input`]: list the directory and read each image; also persists the
//!    finished transcript
//! 2. [`resize`]: cap the longest side; CPU-bound, so it runs in
//!    `spawn_blocking`
//! 3. [`encode`]: sniff the MIME type and wrap the bytes as a data URL for
//!    the multimodal request body
//! 4. [`llm`]: drive the recognition call with retry/backoff and cost
//!    accounting; the only stage with network I/O. Uses [`refusal`] to spot
//!    answers that decline the task
//! 5. [`postprocess`]: deterministic cleanup of model quirks (fences,
//!    line endings, invisible characters)
//! 6. [`transcript`]: extract dates and lay out the final text in listing
//!    order

pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod refusal;
pub mod resize;
pub mod transcript;
