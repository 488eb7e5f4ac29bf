//! # Transcription Gateway
//!
//! The single operation of the service: take an upload, get a transcript.
//!
//! ## Pipeline:
//! 1. **Precondition**: the recognizer's credentials must be present; otherwise
//!    fail before staging anything or touching the network
//! 2. **Inspect**: log WAV header mismatches with the recognition config
//! 3. **Stage**: write the upload to its own temporary file
//! 4. **Recognize**: hand the staged file to the configured strategy
//! 5. **Assemble**: join the top alternative of each segment
//!
//! Each step returns `GatewayResult` and the first failure ends the request.
//! Panics inside the pipeline are caught and reported as
//! `GatewayError::Unknown` so a bad request never takes a worker down.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, info, warn};

use super::result::excerpt;
use super::SpeechRecognizer;
use crate::audio::inspect::{format_mismatches, inspect_wav};
use crate::audio::{AudioStager, UploadedAudio};
use crate::error::{GatewayError, GatewayResult};

pub struct TranscriptionGateway {
    recognizer: Arc<dyn SpeechRecognizer>,
    stager: AudioStager,
    expected_sample_rate: u32,
}

impl TranscriptionGateway {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, stager: AudioStager, expected_sample_rate: u32) -> Self {
        Self {
            recognizer,
            stager,
            expected_sample_rate,
        }
    }

    pub fn strategy(&self) -> &'static str {
        self.recognizer.name()
    }

    /// Transcribe one upload. The staged file is gone when this returns.
    pub async fn transcribe(&self, upload: UploadedAudio) -> GatewayResult<String> {
        match AssertUnwindSafe(self.run(upload)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => Err(GatewayError::Unknown(
                "transcription pipeline panicked".to_string(),
            )),
        }
    }

    async fn run(&self, upload: UploadedAudio) -> GatewayResult<String> {
        self.recognizer.ensure_configured()?;

        debug!(
            filename = upload.filename.as_deref().unwrap_or("<none>"),
            size_bytes = upload.bytes.len(),
            strategy = self.recognizer.name(),
            "Received file"
        );
        self.check_format(&upload.bytes);

        let staged = self.stager.stage(upload).await?;
        let result = self.recognizer.recognize(staged).await?;

        let transcript = result.transcript();
        info!(
            segments = result.results.len(),
            chars = transcript.chars().count(),
            "Transcription completed"
        );
        debug!(preview = %excerpt(&transcript, 100), "Combined transcript");

        Ok(transcript)
    }

    fn check_format(&self, bytes: &[u8]) {
        match inspect_wav(bytes) {
            Some(summary) => {
                for mismatch in format_mismatches(&summary, self.expected_sample_rate) {
                    warn!(mismatch = %mismatch, "Upload does not match the recognition config");
                }
            }
            None => warn!("Upload is not a readable WAV file; sending it as-is"),
        }
    }
}
