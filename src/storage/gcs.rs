use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use super::ObjectStore;
use crate::auth::GoogleAuth;
use crate::error::{GatewayError, GatewayResult};
use crate::transcription::result::{excerpt, ProviderErrorBody};

/// Google Cloud Storage through the JSON API's simple media upload.
pub struct GcsObjectStore {
    http: reqwest::Client,
    endpoint: String,
    auth: Arc<GoogleAuth>,
}

impl GcsObjectStore {
    pub fn new(http: reqwest::Client, endpoint: &str, auth: Arc<GoogleAuth>) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn upload_url(&self, bucket: &str) -> String {
        format!("{}/upload/storage/v1/b/{}/o", self.endpoint, bucket)
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn put(&self, bucket: &str, object: &str, bytes: Vec<u8>) -> GatewayResult<String> {
        let token = self.auth.access_token().await?;
        let size_bytes = bytes.len();

        debug!(bucket = %bucket, object = %object, size_bytes, "Uploading audio to object storage");

        let response = self
            .http
            .post(self.upload_url(bucket))
            .query(&[("uploadType", "media"), ("name", object)])
            .bearer_auth(token)
            .header(CONTENT_TYPE, "audio/wav")
            .body(bytes)
            .send()
            .await
            .map_err(|e| GatewayError::Upload(format!("request to object storage failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|value| value.get("error").cloned())
                .and_then(|error| serde_json::from_value::<ProviderErrorBody>(error).ok())
                .map(|error| error.message)
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| excerpt(&body, 200));
            return Err(GatewayError::Upload(format!(
                "object storage returned HTTP {}: {}",
                status, reason
            )));
        }

        let uri = format!("gs://{}/{}", bucket, object);
        debug!(uri = %uri, "File uploaded");
        Ok(uri)
    }
}
