//! Image store: list, read and persist against a directory of page scans.
//!
//! The orchestrator never touches the file system directly. It talks to an
//! [`ImageStore`], which lets tests substitute an in-memory store and lets
//! embedders read pages from somewhere other than a local directory.
//!
//! [`ImageDirectory`] is the local implementation: a flat (non-recursive)
//! directory whose image files are listed in byte-wise name order.

use crate::error::{ImageError, OcrError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File extensions recognised as images, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Source of page images and sink for the finished transcript.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Image identifiers in ascending order. The order defines ordinals.
    async fn list_images(&self) -> Result<Vec<String>, OcrError>;

    /// Raw bytes of one listed image.
    async fn load_image(&self, name: &str) -> Result<Vec<u8>, ImageError>;

    /// Persist the transcript. Either the whole text lands or nothing does.
    async fn save_transcript(&self, text: &str) -> Result<(), OcrError>;

    /// Human-readable location of the images, for errors and logs.
    fn location(&self) -> PathBuf;
}

/// `true` when `name` carries one of [`IMAGE_EXTENSIONS`].
pub fn is_image_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// A local directory of images with a transcript path.
#[derive(Debug, Clone)]
pub struct ImageDirectory {
    dir: PathBuf,
    output_path: PathBuf,
}

impl ImageDirectory {
    /// `output_path` is used as given; resolve relative paths beforehand
    /// (see [`crate::config::RunConfig::resolved_output_path`]).
    pub fn new(dir: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

#[async_trait]
impl ImageStore for ImageDirectory {
    async fn list_images(&self) -> Result<Vec<String>, OcrError> {
        let not_found = |detail: String| OcrError::DirectoryNotFound {
            path: self.dir.clone(),
            detail,
        };

        let meta = tokio::fs::metadata(&self.dir)
            .await
            .map_err(|e| not_found(e.to_string()))?;
        if !meta.is_dir() {
            return Err(not_found("not a directory".into()));
        }

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| not_found(e.to_string()))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| not_found(e.to_string()))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            // Non-UTF-8 names cannot be sent as identifiers; skip them.
            if let Ok(name) = entry.file_name().into_string() {
                if is_image_file(&name) {
                    names.push(name);
                }
            }
        }
        names.sort();

        info!("Found {} images in {}", names.len(), self.dir.display());
        Ok(names)
    }

    async fn load_image(&self, name: &str) -> Result<Vec<u8>, ImageError> {
        let path = self.dir.join(name);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ImageError::ImageNotFound {
                name: name.to_string(),
                detail: e.to_string(),
            })?;
        debug!("Loaded {} ({} bytes)", name, bytes.len());
        Ok(bytes)
    }

    async fn save_transcript(&self, text: &str) -> Result<(), OcrError> {
        let path = self.output_path.as_path();
        let save_failed = |source: std::io::Error| OcrError::SaveFailed {
            path: path.to_path_buf(),
            source,
        };

        // Atomic write: write to temp, then rename
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(save_failed)?;
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        if let Err(e) = tokio::fs::write(&tmp_path, text).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(save_failed(e));
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(save_failed(e));
        }

        info!("Transcript written to {}", path.display());
        Ok(())
    }

    fn location(&self) -> PathBuf {
        self.dir.clone()
    }
}
