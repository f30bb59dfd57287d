//! Error types for the edgequake-img2txt library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`OcrError`]: **Fatal.** The run cannot proceed or cannot deliver its
//!   transcript (missing directory, no images, rejected API key, output file
//!   not writable, cancellation). Returned as `Err(OcrError)` from
//!   [`crate::run::run_once`] and [`crate::run::Orchestrator::run`].
//!
//! * [`ImageError`]: **Non-fatal.** A single image failed (unreadable file,
//!   undecodable bytes, recognition gave up) while every other image is fine.
//!   Stored inside [`crate::output::PerImageResult`] and rendered inline in
//!   the transcript in place of the transcription.
//!
//! * [`RecognitionError`]: the terminal outcome of one recognition call
//!   after the retry loop in [`crate::pipeline::llm`] has finished with it.
//!   Intermediate attempt failures never surface on their own.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-img2txt library.
///
/// Image-level failures use [`ImageError`] and are stored in
/// [`crate::output::PerImageResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The image directory is absent or is not a directory.
    #[error("Image directory not found: '{path}': {detail}")]
    DirectoryNotFound { path: PathBuf, detail: String },

    /// The directory exists but holds no recognised image files.
    #[error("No images found in '{path}'\nSupported extensions: jpg, jpeg, png, gif, bmp, webp.")]
    NoImagesFound { path: PathBuf },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the transcript file.
    #[error("Failed to save output '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Recognition finished but the transcript could not be persisted.
    #[error("Failed to process images: {0}")]
    ProcessingFailed(#[source] Box<OcrError>),

    // ── Credential errors ─────────────────────────────────────────────────
    /// The recognition service rejected the API key.
    #[error("Invalid API key: the recognition service answered 401 Unauthorized")]
    InvalidCredential,

    /// The credential check got a non-success answer other than 401.
    #[error("API error (status {status}): {message}")]
    RemoteApi { status: u16, message: String },

    /// The credential check never got a usable HTTP answer.
    #[error("Credential check failed: {0}")]
    CredentialCheckFailed(#[source] RecognitionError),

    // ── Run control ───────────────────────────────────────────────────────
    /// The run was cancelled before every image finished.
    #[error("Run cancelled after {completed}/{total} images")]
    Cancelled { completed: usize, total: usize },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RecognitionError> for OcrError {
    /// Maps a failed credential check onto the run-level taxonomy.
    fn from(err: RecognitionError) -> Self {
        match err {
            RecognitionError::InvalidCredential => OcrError::InvalidCredential,
            RecognitionError::RemoteApi { status: 401, .. } => OcrError::InvalidCredential,
            RecognitionError::RemoteApi { status, message } => {
                OcrError::RemoteApi { status, message }
            }
            RecognitionError::Cancelled => OcrError::Cancelled {
                completed: 0,
                total: 0,
            },
            other => OcrError::CredentialCheckFailed(other),
        }
    }
}

/// A non-fatal error for a single image.
///
/// The run continues with every other image; the transcript carries this
/// error's message in place of the failed image's text.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ImageError {
    /// The image file could not be read.
    #[error("Image not found: '{name}': {detail}")]
    ImageNotFound { name: String, detail: String },

    /// The resize cap was zero or negative.
    #[error("Invalid dimension {max}: the longest-side cap must be positive")]
    InvalidDimension { max: i64 },

    /// None of the supported codecs could decode the bytes.
    #[error("Failed to decode image: {detail}")]
    DecodeFailure { detail: String },

    /// The resized image could not be re-encoded.
    #[error("Failed to encode {format} image: {detail}")]
    EncodeFailure { format: String, detail: String },

    /// Recognition reached a terminal failure.
    #[error("{0}")]
    Recognition(#[from] RecognitionError),

    /// The blocking resize worker panicked or was aborted.
    #[error("Image worker failed: {detail}")]
    WorkerFailed { detail: String },

    /// The run was cancelled before this image was started.
    #[error("Skipped: run cancelled")]
    Cancelled,
}

/// Terminal outcome of one recognition call.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum RecognitionError {
    /// The service answered 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidCredential,

    /// The service answered with a non-success HTTP status.
    #[error("API error (status {status}): {message}")]
    RemoteApi { status: u16, message: String },

    /// The request never got an HTTP answer (DNS, TLS, timeout, reset).
    #[error("API request failed: {0}")]
    Transport(String),

    /// The service answered 2xx but the body was unusable.
    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    /// The model declined to transcribe the image.
    #[error("Model refused to process image: {text}")]
    RefusalDetected { text: String },

    /// Every attempt failed; `last` is the final attempt's failure.
    #[error("Max attempts exceeded ({attempts}): {last}")]
    MaxAttemptsExceeded {
        attempts: u32,
        last: Box<RecognitionError>,
    },

    /// The run-scoped cancellation signal fired.
    #[error("Recognition cancelled")]
    Cancelled,
}

impl RecognitionError {
    /// `true` when the service signalled an authentication failure.
    ///
    /// Retrying with the same key cannot succeed, so the retry loop stops.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            RecognitionError::InvalidCredential | RecognitionError::RemoteApi { status: 401, .. }
        )
    }
}
