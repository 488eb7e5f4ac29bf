//! Direct-REST strategy: the whole file travels base64-encoded inside one
//! synchronous `speech:recognize` call, authenticated by an API key in the
//! query string.

use async_trait::async_trait;
use base64::Engine;
use tracing::debug;

use super::request::{RecognitionAudio, RecognizeBody, RecognitionRequest};
use super::result::{parse_provider_body, RecognitionResult};
use super::SpeechRecognizer;
use crate::audio::StagedAudio;
use crate::config::API_KEY_VAR;
use crate::error::{GatewayError, GatewayResult};

pub struct RestRecognizer {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    request: RecognitionRequest,
}

impl RestRecognizer {
    pub fn new(
        http: reqwest::Client,
        endpoint: &str,
        api_key: Option<String>,
        request: RecognitionRequest,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            request,
        }
    }

    fn api_key(&self) -> GatewayResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| GatewayError::Config(format!("{} is not set", API_KEY_VAR)))
    }
}

#[async_trait]
impl SpeechRecognizer for RestRecognizer {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn ensure_configured(&self) -> GatewayResult<()> {
        self.api_key().map(|_| ())
    }

    async fn recognize(&self, audio: StagedAudio) -> GatewayResult<RecognitionResult> {
        let api_key = self.api_key()?;

        let bytes = audio.read().await?;
        audio.discard().await;
        let content = base64::engine::general_purpose::STANDARD.encode(&bytes);

        debug!(
            audio_bytes = bytes.len(),
            encoded_bytes = content.len(),
            "Sending inline audio to speech:recognize"
        );

        let body = RecognizeBody {
            config: &self.request,
            audio: RecognitionAudio::Content(content),
        };

        let response = self
            .http
            .post(format!("{}/v1/speech:recognize", self.endpoint))
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        parse_provider_body(status, &text)
    }
}
