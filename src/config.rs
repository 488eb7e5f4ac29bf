//! # Configuration Management
//!
//! Settings are layered from several sources, lowest priority first:
//! 1. Default values (the `Default` impl below)
//! 2. An optional `config.toml` next to the binary
//! 3. Environment variables prefixed with `APP__` (`__` separates nesting,
//!    e.g. `APP__SPEECH__STRATEGY=rest`)
//! 4. The bare `HOST` / `PORT` variables used by deployment platforms
//!
//! Provider secrets are not part of [`AppConfig`]. They are read once into
//! [`Credentials`] at startup and never serialized or logged.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the service-account key as a JSON blob.
pub const CREDENTIALS_JSON_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS_JSON";
/// Environment variable holding a pre-minted OAuth2 access token.
pub const ACCESS_TOKEN_VAR: &str = "GOOGLE_ACCESS_TOKEN";
/// Environment variable holding the API key used by the REST strategy.
pub const API_KEY_VAR: &str = "GOOGLE_SPEECH_API_KEY";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub speech: SpeechConfig,
    pub storage: StorageConfig,
}

/// HTTP listener settings.
///
/// ## Fields:
/// - `host`: address to bind (`127.0.0.1` for development, `0.0.0.0` in containers)
/// - `port`: TCP port to listen on
/// - `max_upload_bytes`: largest accepted `/transcribe` upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

/// Which recognition strategy the gateway runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionStrategy {
    /// Upload to object storage, then submit and poll a long-running job.
    LongRunning,
    /// Inline base64 audio posted synchronously with an API key.
    Rest,
}

/// Speech provider settings.
///
/// The encoding is always `LINEAR16`; everything else that ends up in the
/// provider's recognition config can be tuned here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    pub strategy: RecognitionStrategy,
    /// Base URL of the Speech-to-Text API, without the `/v1` suffix.
    pub endpoint: String,
    pub language_code: String,
    pub model: String,
    pub sample_rate_hertz: u32,
    pub use_enhanced: bool,
    pub diarization: DiarizationSettings,
    /// Upper bound on the wait for a long-running job.
    pub operation_timeout_secs: u64,
    /// Delay between two polls of a long-running job.
    pub poll_interval_ms: u64,
    /// Timeout applied to every individual outbound HTTP call.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiarizationSettings {
    pub enabled: bool,
    pub min_speakers: u32,
    pub max_speakers: u32,
}

/// Object storage and local staging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket that long-running jobs read their audio from.
    pub bucket: String,
    /// Base URL of the Cloud Storage JSON API.
    pub endpoint: String,
    /// Directory where uploads are staged while a request is in flight.
    pub staging_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                max_upload_bytes: 100 * 1024 * 1024,
            },
            speech: SpeechConfig {
                strategy: RecognitionStrategy::LongRunning,
                endpoint: "https://speech.googleapis.com".to_string(),
                language_code: "en-US".to_string(),
                model: "medical_conversation".to_string(),
                sample_rate_hertz: 16000,
                use_enhanced: true,
                diarization: DiarizationSettings {
                    enabled: true,
                    min_speakers: 2,
                    max_speakers: 2,
                },
                operation_timeout_secs: 600,
                poll_interval_ms: 2000,
                request_timeout_secs: 120,
            },
            storage: StorageConfig {
                bucket: "scribe-ai-graham".to_string(),
                endpoint: "https://storage.googleapis.com".to_string(),
                staging_dir: env::temp_dir(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, `config.toml` and the environment.
    ///
    /// ## Environment Variable Examples:
    /// - `APP__SPEECH__STRATEGY=rest`: switch to the inline REST strategy
    /// - `APP__STORAGE__BUCKET=my-bucket`: upload long-running audio elsewhere
    /// - `PORT=3000`: special case for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").prefix_separator("__").separator("__"));

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Reject settings that would make every request fail.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        if self.speech.sample_rate_hertz == 0 {
            return Err(anyhow::anyhow!("Sample rate must be greater than 0"));
        }

        if self.speech.operation_timeout_secs == 0 || self.speech.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Provider timeouts must be greater than 0"));
        }

        if self.speech.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("Poll interval must be greater than 0"));
        }

        let diarization = &self.speech.diarization;
        if diarization.enabled && diarization.min_speakers > diarization.max_speakers {
            return Err(anyhow::anyhow!(
                "Diarization min_speakers ({}) exceeds max_speakers ({})",
                diarization.min_speakers,
                diarization.max_speakers
            ));
        }

        if self.storage.bucket.trim().is_empty() {
            return Err(anyhow::anyhow!("Storage bucket name cannot be empty"));
        }

        Ok(())
    }
}

impl SpeechConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Provider secrets, read from the process environment exactly once.
///
/// Every field is optional: a missing secret only fails the requests of the
/// strategy that needs it, never the whole process.
#[derive(Clone, Default)]
pub struct Credentials {
    pub service_account_json: Option<String>,
    pub access_token: Option<String>,
    pub api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            service_account_json: non_empty_var(CREDENTIALS_JSON_VAR),
            access_token: non_empty_var(ACCESS_TOKEN_VAR),
            api_key: non_empty_var(API_KEY_VAR),
        }
    }
}

// Secrets never reach the logs, even through `{:?}`.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("service_account_json", &self.service_account_json.is_some())
            .field("access_token", &self.access_token.is_some())
            .field("api_key", &self.api_key.is_some())
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
