//! # Audio Staging
//!
//! Each upload is written to its own temporary file before it is handed to a
//! recognizer. The file lives exactly as long as its [`StagedAudio`] guard:
//! recognizers call [`StagedAudio::discard`] as soon as the bytes have been
//! uploaded or encoded, and `Drop` removes the file on every other path
//! (early `?` returns, timeouts, panics unwinding through the handler).
//!
//! ## Naming:
//! Staged files are named `<uuid v4>.wav` and opened with `create_new`, so
//! two concurrent requests can never write to the same path.

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::UploadedAudio;
use crate::error::{GatewayError, GatewayResult};

/// Writes uploads into the staging directory.
#[derive(Debug, Clone)]
pub struct AudioStager {
    dir: PathBuf,
}

impl AudioStager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist the upload to a fresh temporary file.
    ///
    /// ## Returns:
    /// - **Ok(StagedAudio)**: guard owning the new file
    /// - **Err(GatewayError::Staging)**: the directory or file could not be written;
    ///   any partially written file has already been removed
    pub async fn stage(&self, upload: UploadedAudio) -> GatewayResult<StagedAudio> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            GatewayError::Staging(format!(
                "cannot create staging directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let path = self.dir.join(format!("{}.wav", Uuid::new_v4()));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                GatewayError::Staging(format!("cannot create {}: {}", path.display(), e))
            })?;

        // The guard exists before the first byte is written so a failed
        // write still cleans up after itself.
        let staged = StagedAudio {
            path,
            filename: upload.filename,
            size_bytes: upload.bytes.len() as u64,
            removed: false,
        };

        file.write_all(&upload.bytes)
            .await
            .map_err(|e| GatewayError::Staging(format!("cannot write staged audio: {}", e)))?;
        file.flush()
            .await
            .map_err(|e| GatewayError::Staging(format!("cannot flush staged audio: {}", e)))?;

        debug!(
            path = %staged.path.display(),
            size_bytes = staged.size_bytes,
            "Saved temporary audio file"
        );

        Ok(staged)
    }
}

/// A staged upload on local disk. Removing the file is tied to this value.
#[derive(Debug)]
pub struct StagedAudio {
    path: PathBuf,
    filename: Option<String>,
    size_bytes: u64,
    removed: bool,
}

impl StagedAudio {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Name under which the audio is stored remotely: the client's filename,
    /// or the staged file's own name when the client sent none.
    pub fn object_name(&self) -> String {
        match self.filename.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "audio.wav".to_string()),
        }
    }

    pub async fn read(&self) -> GatewayResult<Vec<u8>> {
        tokio::fs::read(&self.path).await.map_err(|e| {
            GatewayError::Staging(format!("cannot read {}: {}", self.path.display(), e))
        })
    }

    /// Delete the staged file now. Failures are logged and otherwise ignored.
    pub async fn discard(mut self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Temporary audio file deleted"),
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to delete temporary audio file"
            ),
        }
        self.removed = true;
    }
}

impl Drop for StagedAudio {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Temporary audio file deleted on drop"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to delete temporary audio file"
            ),
        }
    }
}
