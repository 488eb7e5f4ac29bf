use serde::Serialize;

use crate::error::GatewayError;

/// Body of every `/transcribe` reply.
///
/// Serialized with a `status` discriminator, so a body carries either
/// `transcription` or `message` and never both:
/// ```json
/// { "status": "success", "transcription": "Patient reports mild headache" }
/// { "status": "error", "message": "quota exceeded" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum GatewayResponse {
    Success { transcription: String },
    Error { message: String },
}

impl GatewayResponse {
    pub fn success(transcription: impl Into<String>) -> Self {
        GatewayResponse::Success {
            transcription: transcription.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        GatewayResponse::Error {
            message: message.into(),
        }
    }
}

impl From<GatewayError> for GatewayResponse {
    fn from(err: GatewayError) -> Self {
        GatewayResponse::error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        assert_eq!(
            serde_json::to_value(GatewayResponse::success("Patient reports mild headache")).unwrap(),
            json!({"status": "success", "transcription": "Patient reports mild headache"})
        );
        assert_eq!(
            serde_json::to_value(GatewayResponse::from(GatewayError::Provider(
                "quota exceeded".to_string()
            )))
            .unwrap(),
            json!({"status": "error", "message": "quota exceeded"})
        );
    }

    #[test]
    fn test_empty_transcript_is_still_success() {
        let value = serde_json::to_value(GatewayResponse::success("")).unwrap();
        assert_eq!(value, json!({"status": "success", "transcription": ""}));
    }
}
