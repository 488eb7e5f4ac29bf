//! # Error Handling
//!
//! Every failure on the transcription path is a [`GatewayError`]. Internal
//! steps return `GatewayResult<T>` and propagate with `?`; the request
//! boundary turns whatever arrives there into the JSON error body.
//!
//! ## Wire contract:
//! Errors never change the HTTP status. The caller always gets `200 OK` and
//! a parseable body:
//! ```json
//! { "status": "error", "message": "quota exceeded" }
//! ```
//! The category is still visible in the message prefix, in the logs and in
//! the metrics.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::transcription::GatewayResponse;

/// Failure categories of the transcription pipeline.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Credentials missing or unusable for the selected strategy
    #[error("Configuration error: {0}")]
    Config(String),

    /// The request did not carry a usable audio file
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// Writing or reading the staged temporary file failed
    #[error("Staging error: {0}")]
    Staging(String),

    /// Object storage rejected the audio
    #[error("Upload error: {0}")]
    Upload(String),

    /// The speech provider answered with an error or an unreadable body.
    /// The provider's own message is passed through untouched.
    #[error("{0}")]
    Provider(String),

    /// A long-running job did not finish within its bound
    #[error("Timeout: recognition did not complete within {0} seconds")]
    Timeout(u64),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl GatewayError {
    /// Short machine-readable category, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "config_error",
            GatewayError::InvalidUpload(_) => "invalid_upload",
            GatewayError::Staging(_) => "staging_error",
            GatewayError::Upload(_) => "upload_error",
            GatewayError::Provider(_) => "provider_error",
            GatewayError::Timeout(_) => "timeout",
            GatewayError::Unknown(_) => "unknown_error",
        }
    }
}

/// Errors escaping a handler still render as a normal response.
impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        StatusCode::OK
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(GatewayResponse::error(self.to_string()))
    }
}

// The request URL can carry the API key, so it never reaches the message.
impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            GatewayError::Provider(format!("request to provider timed out: {}", err))
        } else {
            GatewayError::Provider(format!("request to provider failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Provider(format!("malformed provider response: {}", err))
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
