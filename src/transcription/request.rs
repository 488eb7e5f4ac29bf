//! Recognition request sent to the speech provider.
//!
//! Serializes to the provider's `RecognitionConfig` JSON (camelCase keys).

use serde::Serialize;

use crate::config::SpeechConfig;

/// Sample encoding of the uploaded audio. Only 16-bit linear PCM is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AudioEncoding {
    #[serde(rename = "LINEAR16")]
    Linear16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiarizationConfig {
    pub enable_speaker_diarization: bool,
    pub min_speaker_count: u32,
    pub max_speaker_count: u32,
}

/// Per-request recognition settings. Built fresh for every request and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionRequest {
    pub encoding: AudioEncoding,
    pub sample_rate_hertz: u32,
    pub language_code: String,
    pub model: String,
    pub use_enhanced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diarization_config: Option<DiarizationConfig>,
}

impl RecognitionRequest {
    pub fn from_config(speech: &SpeechConfig) -> Self {
        let diarization_config = speech.diarization.enabled.then(|| DiarizationConfig {
            enable_speaker_diarization: true,
            min_speaker_count: speech.diarization.min_speakers,
            max_speaker_count: speech.diarization.max_speakers,
        });

        Self {
            encoding: AudioEncoding::Linear16,
            sample_rate_hertz: speech.sample_rate_hertz,
            language_code: speech.language_code.clone(),
            model: speech.model.clone(),
            use_enhanced: speech.use_enhanced,
            diarization_config,
        }
    }
}

/// Where the provider finds the audio.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionAudio {
    /// Base64 of the whole file, inline in the request body.
    Content(String),
    /// `gs://bucket/object` reference to an uploaded file.
    Uri(String),
}

/// Body shared by `speech:recognize` and `speech:longrunningrecognize`.
#[derive(Debug, Serialize)]
pub struct RecognizeBody<'a> {
    pub config: &'a RecognitionRequest,
    pub audio: RecognitionAudio,
}
