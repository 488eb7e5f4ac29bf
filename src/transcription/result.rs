//! # Recognition Results
//!
//! Mapping of the provider's JSON answers and the transcript assembly rule.
//!
//! ## Assembly:
//! Segments are kept in the order the provider returned them. Only the top
//! alternative of each segment is used, trimmed, and the pieces are joined
//! with a single space. Segments without a usable top alternative are
//! skipped (with diarization on, the provider appends a final segment that
//! only carries speaker-tagged words and an empty transcript).

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{GatewayError, GatewayResult};

/// Ordered recognition output of one request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecognitionResult {
    #[serde(default)]
    pub results: Vec<Segment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Segment {
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Alternative {
    #[serde(default)]
    pub transcript: String,
}

impl RecognitionResult {
    /// Build a result from plain segment texts, one alternative each.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            results: segments
                .into_iter()
                .map(|text| Segment {
                    alternatives: vec![Alternative {
                        transcript: text.into(),
                    }],
                })
                .collect(),
        }
    }

    pub fn transcript(&self) -> String {
        self.results
            .iter()
            .filter_map(|segment| segment.alternatives.first())
            .map(|alternative| alternative.transcript.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The provider's error object: `{"error": {"code": .., "message": .., "status": ..}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderErrorBody {
    #[serde(default)]
    pub code: Option<i32>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl ProviderErrorBody {
    pub fn into_error(self) -> GatewayError {
        if !self.message.is_empty() {
            return GatewayError::Provider(self.message);
        }
        let detail = match (self.status, self.code) {
            (Some(status), _) => status,
            (None, Some(code)) => format!("code {}", code),
            (None, None) => "unspecified error".to_string(),
        };
        GatewayError::Provider(format!("provider reported an error: {}", detail))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ProviderErrorBody>,
}

/// Decode a provider reply, giving its `error` object precedence.
///
/// ## Rules:
/// 1. A body carrying an `error` object fails with that object's message,
///    whatever the HTTP status
/// 2. Any other non-2xx status fails with the status and a short body excerpt
/// 3. Otherwise the body must decode as `T`
pub fn parse_provider_body<T: DeserializeOwned>(status: StatusCode, body: &str) -> GatewayResult<T> {
    if let Ok(ErrorEnvelope { error: Some(error) }) = serde_json::from_str::<ErrorEnvelope>(body) {
        return Err(error.into_error());
    }

    if !status.is_success() {
        return Err(GatewayError::Provider(format!(
            "provider returned HTTP {}: {}",
            status,
            excerpt(body, 200)
        )));
    }

    Ok(serde_json::from_str(body)?)
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}
