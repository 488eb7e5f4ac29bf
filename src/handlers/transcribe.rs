use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use futures_util::stream::StreamExt;
use tracing::{error, info};

use crate::audio::UploadedAudio;
use crate::error::{GatewayError, GatewayResult};
use crate::state::AppState;
use crate::transcription::GatewayResponse;

/// Multipart field the audio is expected under.
const FILE_FIELD: &str = "file";

/// Transcribe an uploaded audio file.
///
/// ## Endpoint: `POST /transcribe`
///
/// ## Request:
/// Multipart form data with the audio under the field `file`. A form without
/// that field falls back to the first part that carries a filename.
///
/// ## Response:
/// Always `200 OK`, with exactly one of:
/// ```json
/// { "status": "success", "transcription": "Patient reports mild headache" }
/// { "status": "error", "message": "quota exceeded" }
/// ```
pub async fn transcribe(state: web::Data<AppState>, payload: Multipart) -> HttpResponse {
    let tracker = state.track_transcription();

    let outcome = match read_upload(payload, state.config.server.max_upload_bytes).await {
        Ok(upload) => {
            let gateway = state.gateway.clone();
            // The job runs on its own task so a client disconnect does not
            // abort the provider calls or skip temp file cleanup.
            actix_web::rt::spawn(async move {
                let outcome = gateway.transcribe(upload).await;
                tracker.finish(outcome.as_ref().err().map(GatewayError::kind));
                outcome
            })
            .await
            .unwrap_or_else(|e| Err(GatewayError::Unknown(format!("transcription task failed: {}", e))))
        }
        Err(e) => {
            tracker.finish(Some(e.kind()));
            Err(e)
        }
    };

    match outcome {
        Ok(transcription) => HttpResponse::Ok().json(GatewayResponse::success(transcription)),
        Err(e) => {
            error!(kind = e.kind(), error = %e, "Transcription failed");
            HttpResponse::Ok().json(GatewayResponse::from(e))
        }
    }
}

/// Pull the audio part out of the multipart body, enforcing the size limit
/// while reading.
async fn read_upload(mut payload: Multipart, max_bytes: usize) -> GatewayResult<UploadedAudio> {
    let mut fallback: Option<UploadedAudio> = None;

    while let Some(item) = payload.next().await {
        let field: Field =
            item.map_err(|e| GatewayError::InvalidUpload(format!("Multipart error: {}", e)))?;

        let (name, filename) = match field.content_disposition() {
            Some(disposition) => (
                disposition.get_name().map(|s| s.to_string()),
                disposition.get_filename().map(|s| s.to_string()),
            ),
            None => (None, None),
        };

        if name.as_deref() == Some(FILE_FIELD) {
            let bytes = read_field(field, max_bytes).await?;
            info!(
                filename = filename.as_deref().unwrap_or("<none>"),
                size_bytes = bytes.len(),
                "Upload received"
            );
            return Ok(UploadedAudio { filename, bytes });
        }

        if fallback.is_none() && filename.is_some() {
            let bytes = read_field(field, max_bytes).await?;
            fallback = Some(UploadedAudio { filename, bytes });
        }
    }

    fallback.ok_or_else(|| {
        GatewayError::InvalidUpload(format!("No audio file provided in field '{}'", FILE_FIELD))
    })
}

async fn read_field(mut field: Field, max_bytes: usize) -> GatewayResult<Vec<u8>> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| GatewayError::InvalidUpload(format!("Chunk error: {}", e)))?;
        if bytes.len() + chunk.len() > max_bytes {
            return Err(GatewayError::InvalidUpload(format!(
                "File too large (max: {} bytes)",
                max_bytes
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::test_wav;
    use crate::config::AppConfig;
    use crate::transcription::testing::MockRecognizer;
    use crate::transcription::SpeechRecognizer;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};
    use std::sync::Arc;
    use tempfile::TempDir;

    const BOUNDARY: &str = "gateway-test-boundary";

    fn multipart_body(field: &str, filename: Option<&str>, content: &[u8]) -> Vec<u8> {
        let disposition = match filename {
            Some(filename) => format!("form-data; name=\"{}\"; filename=\"{}\"", field, filename),
            None => format!("form-data; name=\"{}\"", field),
        };
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(format!("Content-Disposition: {}\r\n", disposition).as_bytes());
        body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/transcribe")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body)
    }

    fn state(recognizer: Arc<dyn SpeechRecognizer>, staging: &TempDir) -> AppState {
        let mut config = AppConfig::default();
        config.storage.staging_dir = staging.path().to_path_buf();
        AppState::new(config, recognizer)
    }

    async fn post(state: AppState, body: Vec<u8>) -> serde_json::Value {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/transcribe", web::post().to(transcribe)),
        )
        .await;
        let response = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(response.status(), StatusCode::OK);
        test::read_body_json(response).await
    }

    #[actix_web::test]
    async fn test_success_response() {
        let staging = TempDir::new().unwrap();
        let mock = Arc::new(MockRecognizer::with_segments(&["Patient reports", "mild headache"]));
        let state = state(mock.clone(), &staging);

        let wav = test_wav(16000, 1, &[0, 512, -512, 0]);
        let body = post(state.clone(), multipart_body("file", Some("visit.wav"), &wav)).await;

        assert_eq!(body["status"], "success");
        assert_eq!(body["transcription"], "Patient reports mild headache");
        assert!(body.get("message").is_none());
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.transcriptions_succeeded, 1);
        assert_eq!(metrics.in_flight_transcriptions, 0);
    }

    #[actix_web::test]
    async fn test_provider_error_is_reported_with_200() {
        let staging = TempDir::new().unwrap();
        let state = state(Arc::new(MockRecognizer::failing("quota exceeded")), &staging);

        let body = post(state.clone(), multipart_body("file", Some("visit.wav"), b"RIFF")).await;

        assert_eq!(body, serde_json::json!({ "status": "error", "message": "quota exceeded" }));
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
        assert_eq!(
            state.get_metrics_snapshot().failures_by_kind.get("provider_error"),
            Some(&1)
        );
    }

    #[actix_web::test]
    async fn test_missing_credentials_reported_without_provider_call() {
        let staging = TempDir::new().unwrap();
        let mock = Arc::new(MockRecognizer::unconfigured());
        let state = state(mock.clone(), &staging);

        let body = post(state, multipart_body("file", Some("visit.wav"), b"RIFF")).await;

        assert_eq!(body["status"], "error");
        assert!(body.get("transcription").is_none());
        assert_eq!(mock.calls(), 0);
    }

    #[actix_web::test]
    async fn test_form_without_file_is_an_error() {
        let staging = TempDir::new().unwrap();
        let mock = Arc::new(MockRecognizer::with_segments(&["unused"]));
        let state = state(mock.clone(), &staging);

        let body = post(state, multipart_body("notes", None, b"just text")).await;

        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("No audio file"));
        assert_eq!(mock.calls(), 0);
    }

    #[actix_web::test]
    async fn test_differently_named_file_part_is_accepted() {
        let staging = TempDir::new().unwrap();
        let mock = Arc::new(MockRecognizer::with_segments(&["hello"]));
        let state = state(mock.clone(), &staging);

        let body = post(state, multipart_body("audio", Some("a.wav"), b"RIFF")).await;

        assert_eq!(body["status"], "success");
        assert_eq!(body["transcription"], "hello");
    }

    #[actix_web::test]
    async fn test_oversized_upload_is_rejected() {
        let staging = TempDir::new().unwrap();
        let mock = Arc::new(MockRecognizer::with_segments(&["unused"]));
        let mut state = state(mock.clone(), &staging);
        let mut config = (*state.config).clone();
        config.server.max_upload_bytes = 8;
        state.config = Arc::new(config);

        let body = post(state, multipart_body("file", Some("big.wav"), &[0u8; 64])).await;

        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("too large"));
        assert_eq!(mock.calls(), 0);
    }
}
