//! # Long-Running Recognition
//!
//! Managed strategy for recordings too long for a synchronous call.
//!
//! ## Flow:
//! 1. Upload the staged file to the configured bucket under the client's
//!    filename, then delete the local copy
//! 2. Submit `speech:longrunningrecognize` against the `gs://` URI
//! 3. Poll `operations/{name}` every `poll_interval` until it reports `done`
//! 4. Give up with `GatewayError::Timeout` once `timeout` has elapsed
//!
//! Dropping the future stops the polling but does not cancel
//! the job on the provider side.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::request::{RecognitionAudio, RecognizeBody, RecognitionRequest};
use super::result::{parse_provider_body, ProviderErrorBody, RecognitionResult};
use super::SpeechRecognizer;
use crate::audio::StagedAudio;
use crate::auth::GoogleAuth;
use crate::error::{GatewayError, GatewayResult};
use crate::storage::ObjectStore;

/// Long-running operation resource as returned by submit and poll.
#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<ProviderErrorBody>,
    #[serde(default)]
    response: Option<RecognitionResult>,
}

pub struct LongRunningRecognizer {
    http: reqwest::Client,
    endpoint: String,
    auth: Arc<GoogleAuth>,
    store: Arc<dyn ObjectStore>,
    bucket: String,
    request: RecognitionRequest,
    timeout: Duration,
    poll_interval: Duration,
}

impl LongRunningRecognizer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        http: reqwest::Client,
        endpoint: &str,
        auth: Arc<GoogleAuth>,
        store: Arc<dyn ObjectStore>,
        bucket: &str,
        request: RecognitionRequest,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth,
            store,
            bucket: bucket.to_string(),
            request,
            timeout,
            poll_interval,
        }
    }

    async fn upload(&self, audio: StagedAudio) -> GatewayResult<String> {
        let object_name = audio.object_name();
        debug!(object = %object_name, size_bytes = audio.size_bytes(), "Uploading staged audio");
        let bytes = audio.read().await?;
        let uploaded = self.store.put(&self.bucket, &object_name, bytes).await;
        audio.discard().await;
        uploaded
    }

    async fn submit(&self, uri: String) -> GatewayResult<Operation> {
        let token = self.auth.access_token().await?;
        let body = RecognizeBody {
            config: &self.request,
            audio: RecognitionAudio::Uri(uri),
        };

        let response = self
            .http
            .post(format!("{}/v1/speech:longrunningrecognize", self.endpoint))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        parse_provider_body(status, &text)
    }

    async fn fetch(&self, name: &str) -> GatewayResult<Operation> {
        let token = self.auth.access_token().await?;
        let response = self
            .http
            .get(format!("{}/v1/operations/{}", self.endpoint, name))
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        parse_provider_body(status, &text)
    }

    async fn wait_for(&self, mut operation: Operation) -> GatewayResult<RecognitionResult> {
        let mut polls = 0u32;
        loop {
            if operation.done {
                if let Some(error) = operation.error {
                    return Err(error.into_error());
                }
                debug!(operation = %operation.name, polls, "Operation completed");
                return Ok(operation.response.unwrap_or_default());
            }

            tokio::time::sleep(self.poll_interval).await;
            polls += 1;
            operation = self.fetch(&operation.name).await?;
        }
    }
}

#[async_trait]
impl SpeechRecognizer for LongRunningRecognizer {
    fn name(&self) -> &'static str {
        "long_running"
    }

    fn ensure_configured(&self) -> GatewayResult<()> {
        self.auth.ensure_configured()
    }

    async fn recognize(&self, audio: StagedAudio) -> GatewayResult<RecognitionResult> {
        self.auth.ensure_configured()?;

        let uri = self.upload(audio).await?;

        let operation = self.submit(uri).await?;
        info!(operation = %operation.name, "Started long-running recognition");

        let started = Instant::now();
        let result = tokio::time::timeout(self.timeout, self.wait_for(operation))
            .await
            .map_err(|_| GatewayError::Timeout(self.timeout.as_secs()))??;

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            segments = result.results.len(),
            "Long-running recognition finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioStager, UploadedAudio};
    use crate::config::{AppConfig, Credentials};
    use crate::storage::GcsObjectStore;
    use actix_web::{web, App, HttpResponse, HttpServer};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Clone)]
    struct Provider {
        uploaded_names: Arc<Mutex<Vec<String>>>,
        submitted_uris: Arc<Mutex<Vec<String>>>,
        polls: Arc<AtomicUsize>,
        // Polls answered with done=false before the final reply
        pending_polls: usize,
        final_reply: Value,
        reject_uploads: bool,
    }

    impl Provider {
        fn new(pending_polls: usize, final_reply: Value) -> Self {
            Self {
                uploaded_names: Arc::new(Mutex::new(Vec::new())),
                submitted_uris: Arc::new(Mutex::new(Vec::new())),
                polls: Arc::new(AtomicUsize::new(0)),
                pending_polls,
                final_reply,
                reject_uploads: false,
            }
        }
    }

    async fn upload(
        provider: web::Data<Provider>,
        query: web::Query<std::collections::HashMap<String, String>>,
    ) -> HttpResponse {
        if provider.reject_uploads {
            return HttpResponse::Forbidden().json(json!({
                "error": {"code": 403, "message": "bucket access denied"}
            }));
        }
        let name = query.get("name").cloned().unwrap_or_default();
        provider.uploaded_names.lock().unwrap().push(name.clone());
        HttpResponse::Ok().json(json!({ "name": name }))
    }

    async fn submit(provider: web::Data<Provider>, body: web::Json<Value>) -> HttpResponse {
        let uri = body["audio"]["uri"].as_str().unwrap_or_default().to_string();
        provider.submitted_uris.lock().unwrap().push(uri);
        HttpResponse::Ok().json(json!({ "name": "op-42" }))
    }

    async fn poll(provider: web::Data<Provider>, name: web::Path<String>) -> HttpResponse {
        let seen = provider.polls.fetch_add(1, Ordering::SeqCst);
        if seen < provider.pending_polls {
            return HttpResponse::Ok().json(json!({ "name": name.into_inner(), "done": false }));
        }
        let mut reply = provider.final_reply.clone();
        reply["name"] = json!(name.into_inner());
        HttpResponse::Ok().json(reply)
    }

    fn spawn_provider(provider: Provider) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(provider.clone()))
                .route("/upload/storage/v1/b/{bucket}/o", web::post().to(upload))
                .route("/v1/speech:longrunningrecognize", web::post().to(submit))
                .route("/v1/operations/{name}", web::get().to(poll))
        })
        .workers(1)
        .listen(listener)
        .unwrap()
        .run();

        actix_web::rt::spawn(server);
        format!("http://{}", addr)
    }

    fn recognizer(base_url: &str, timeout: Duration) -> LongRunningRecognizer {
        let credentials = Credentials {
            access_token: Some("test-token".to_string()),
            ..Credentials::default()
        };
        let http = reqwest::Client::new();
        let auth = Arc::new(GoogleAuth::new(&credentials, http.clone()));
        let store = Arc::new(GcsObjectStore::new(http.clone(), base_url, auth.clone()));

        LongRunningRecognizer::new(
            http,
            base_url,
            auth,
            store,
            "scribe-ai-graham",
            RecognitionRequest::from_config(&AppConfig::default().speech),
            timeout,
            Duration::from_millis(20),
        )
    }

    async fn stage(dir: &std::path::Path) -> StagedAudio {
        AudioStager::new(dir)
            .stage(UploadedAudio {
                filename: Some("consult.wav".to_string()),
                bytes: b"RIFF....WAVE".to_vec(),
            })
            .await
            .unwrap()
    }

    #[actix_web::test]
    async fn test_upload_submit_and_poll_until_done() {
        let provider = Provider::new(
            2,
            json!({
                "done": true,
                "response": {
                    "results": [
                        {"alternatives": [{"transcript": "Patient reports"}]},
                        {"alternatives": [{"transcript": "mild headache"}]}
                    ]
                }
            }),
        );
        let base_url = spawn_provider(provider.clone());
        let dir = tempfile::TempDir::new().unwrap();

        let result = recognizer(&base_url, Duration::from_secs(10))
            .recognize(stage(dir.path()).await)
            .await
            .unwrap();

        assert_eq!(result.transcript(), "Patient reports mild headache");
        assert_eq!(provider.uploaded_names.lock().unwrap().as_slice(), ["consult.wav"]);
        assert_eq!(
            provider.submitted_uris.lock().unwrap().as_slice(),
            ["gs://scribe-ai-graham/consult.wav"]
        );
        assert_eq!(provider.polls.load(Ordering::SeqCst), 3);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[actix_web::test]
    async fn test_failed_operation_is_provider_error() {
        let provider = Provider::new(
            0,
            json!({"done": true, "error": {"code": 3, "message": "Invalid audio encoding"}}),
        );
        let base_url = spawn_provider(provider);
        let dir = tempfile::TempDir::new().unwrap();

        let err = recognizer(&base_url, Duration::from_secs(10))
            .recognize(stage(dir.path()).await)
            .await
            .unwrap_err();

        assert!(matches!(&err, GatewayError::Provider(msg) if msg == "Invalid audio encoding"));
    }

    #[actix_web::test]
    async fn test_job_that_never_finishes_times_out() {
        let provider = Provider::new(usize::MAX, json!({}));
        let base_url = spawn_provider(provider.clone());
        let dir = tempfile::TempDir::new().unwrap();

        let err = recognizer(&base_url, Duration::from_secs(1))
            .recognize(stage(dir.path()).await)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Timeout(1)));
        assert!(provider.polls.load(Ordering::SeqCst) > 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[actix_web::test]
    async fn test_rejected_upload_cleans_up_and_skips_submit() {
        let mut provider = Provider::new(0, json!({"done": true}));
        provider.reject_uploads = true;
        let base_url = spawn_provider(provider.clone());
        let dir = tempfile::TempDir::new().unwrap();

        let err = recognizer(&base_url, Duration::from_secs(10))
            .recognize(stage(dir.path()).await)
            .await
            .unwrap_err();

        assert!(matches!(&err, GatewayError::Upload(msg) if msg.contains("bucket access denied")));
        assert!(provider.submitted_uris.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[actix_web::test]
    async fn test_missing_credentials_skip_upload() {
        let provider = Provider::new(0, json!({"done": true}));
        let base_url = spawn_provider(provider.clone());
        let http = reqwest::Client::new();
        let auth = Arc::new(GoogleAuth::new(&Credentials::default(), http.clone()));
        let store = Arc::new(GcsObjectStore::new(http.clone(), &base_url, auth.clone()));
        let recognizer = LongRunningRecognizer::new(
            http,
            &base_url,
            auth,
            store,
            "scribe-ai-graham",
            RecognitionRequest::from_config(&AppConfig::default().speech),
            Duration::from_secs(1),
            Duration::from_millis(20),
        );
        let dir = tempfile::TempDir::new().unwrap();

        let err = recognizer.recognize(stage(dir.path()).await).await.unwrap_err();

        assert!(matches!(err, GatewayError::Config(_)));
        assert!(provider.uploaded_names.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
