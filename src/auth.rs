//! # Google Access Tokens
//!
//! The long-running strategy calls Cloud Storage and the Speech API with an
//! OAuth2 bearer token. Two sources are supported:
//! - **Access token**: `GOOGLE_ACCESS_TOKEN`, used as-is
//! - **Service account**: `GOOGLE_APPLICATION_CREDENTIALS_JSON`, exchanged for a
//!   token through the JWT-bearer grant (RS256, `cloud-platform` scope)
//!
//! Exchanged tokens are cached and refreshed a minute before they expire.
//! The cache is the only mutable state shared between requests.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{Credentials, ACCESS_TOKEN_VAR, CREDENTIALS_JSON_VAR};
use crate::error::{GatewayError, GatewayResult};
use crate::transcription::result::excerpt;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const REFRESH_SKEW: Duration = Duration::from_secs(60);

/// Fields of a service-account key file that the token exchange needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Clone)]
enum TokenSource {
    Static(String),
    ServiceAccount(ServiceAccountKey),
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Hands out bearer tokens for Google APIs.
pub struct GoogleAuth {
    // Err keeps the reason the credentials are unusable, reported per request.
    source: Result<TokenSource, String>,
    http: reqwest::Client,
    cache: Mutex<Option<CachedToken>>,
}

impl GoogleAuth {
    pub fn new(credentials: &Credentials, http: reqwest::Client) -> Self {
        let source = if let Some(token) = &credentials.access_token {
            Ok(TokenSource::Static(token.clone()))
        } else if let Some(json) = &credentials.service_account_json {
            serde_json::from_str::<ServiceAccountKey>(json)
                .map(TokenSource::ServiceAccount)
                .map_err(|e| format!("{} is not a valid service-account key: {}", CREDENTIALS_JSON_VAR, e))
        } else {
            Err(format!("neither {} nor {} is set", CREDENTIALS_JSON_VAR, ACCESS_TOKEN_VAR))
        };

        Self {
            source,
            http,
            cache: Mutex::new(None),
        }
    }

    /// Fails with `GatewayError::Config` when no usable credential was provided.
    pub fn ensure_configured(&self) -> GatewayResult<()> {
        self.source
            .as_ref()
            .map(|_| ())
            .map_err(|reason| GatewayError::Config(reason.clone()))
    }

    pub async fn access_token(&self) -> GatewayResult<String> {
        let key = match &self.source {
            Ok(TokenSource::Static(token)) => return Ok(token.clone()),
            Ok(TokenSource::ServiceAccount(key)) => key,
            Err(reason) => return Err(GatewayError::Config(reason.clone())),
        };

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.expires_at.saturating_duration_since(Instant::now()) > REFRESH_SKEW {
                return Ok(cached.value.clone());
            }
        }

        let fresh = self.exchange(key).await?;
        let value = fresh.value.clone();
        *cache = Some(fresh);
        Ok(value)
    }

    async fn exchange(&self, key: &ServiceAccountKey) -> GatewayResult<CachedToken> {
        let token_uri = key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        let assertion = signed_assertion(key, token_uri)?;

        debug!(client_email = %key.client_email, "Exchanging service-account assertion for access token");

        let response = self
            .http
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| GatewayError::Config(format!("token exchange failed: {}", e.without_url())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Config(format!("token exchange failed: {}", e.without_url())))?;

        if !status.is_success() {
            return Err(GatewayError::Config(format!(
                "token exchange rejected with HTTP {}: {}",
                status,
                excerpt(&body, 200)
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Config(format!("unreadable token response: {}", e)))?;

        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}

fn signed_assertion(key: &ServiceAccountKey, audience: &str) -> GatewayResult<String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| GatewayError::Unknown(format!("system clock before unix epoch: {}", e)))?
        .as_secs();

    let claims = Claims {
        iss: &key.client_email,
        scope: CLOUD_PLATFORM_SCOPE,
        aud: audience,
        iat: now,
        exp: now + 3600,
    };

    let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| GatewayError::Config(format!("invalid service-account private key: {}", e)))?;

    encode(&Header::new(Algorithm::RS256), &claims, &signing_key)
        .map_err(|e| GatewayError::Config(format!("cannot sign service-account assertion: {}", e)))
}
