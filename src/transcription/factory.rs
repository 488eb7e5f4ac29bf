use std::sync::Arc;

use anyhow::Result;

use super::long_running::LongRunningRecognizer;
use super::rest::RestRecognizer;
use super::{RecognitionRequest, SpeechRecognizer};
use crate::auth::GoogleAuth;
use crate::config::{AppConfig, Credentials, RecognitionStrategy};
use crate::storage::GcsObjectStore;

/// Build the recognizer selected by `speech.strategy`.
///
/// Missing credentials do not fail here; the recognizer reports them on
/// each request instead, so the service still starts and answers liveness
/// checks.
pub fn build_recognizer(config: &AppConfig, credentials: &Credentials) -> Result<Arc<dyn SpeechRecognizer>> {
    let http = reqwest::Client::builder()
        .timeout(config.speech.request_timeout())
        .build()?;
    let request = RecognitionRequest::from_config(&config.speech);

    let recognizer: Arc<dyn SpeechRecognizer> = match config.speech.strategy {
        RecognitionStrategy::LongRunning => {
            let auth = Arc::new(GoogleAuth::new(credentials, http.clone()));
            let store = Arc::new(GcsObjectStore::new(http.clone(), &config.storage.endpoint, auth.clone()));
            Arc::new(LongRunningRecognizer::new(
                http,
                &config.speech.endpoint,
                auth,
                store,
                &config.storage.bucket,
                request,
                config.speech.operation_timeout(),
                config.speech.poll_interval(),
            ))
        }
        RecognitionStrategy::Rest => Arc::new(RestRecognizer::new(
            http,
            &config.speech.endpoint,
            credentials.api_key.clone(),
            request,
        )),
    };

    Ok(recognizer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_selection() {
        let mut config = AppConfig::default();
        let credentials = Credentials {
            api_key: Some("key".to_string()),
            ..Credentials::default()
        };

        let recognizer = build_recognizer(&config, &credentials).unwrap();
        assert_eq!(recognizer.name(), "long_running");
        // An API key alone does not configure the long-running strategy
        assert!(recognizer.ensure_configured().is_err());

        config.speech.strategy = RecognitionStrategy::Rest;
        let recognizer = build_recognizer(&config, &credentials).unwrap();
        assert_eq!(recognizer.name(), "rest");
        assert!(recognizer.ensure_configured().is_ok());
    }
}
