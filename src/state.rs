//! # Application State
//!
//! State shared by every request handler through `web::Data<AppState>`.
//!
//! ## What is shared:
//! - **config**: built once in `main`, read-only afterwards (`Arc`, no lock)
//! - **gateway**: the transcription pipeline with its selected recognizer
//! - **metrics**: counters updated by the middleware and the transcribe handler
//!
//! Only the metrics are mutable. They sit behind an `RwLock` so the
//! `/metrics` endpoint can read a consistent snapshot.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use crate::audio::AudioStager;
use crate::config::AppConfig;
use crate::transcription::{SpeechRecognizer, TranscriptionGateway};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub gateway: Arc<TranscriptionGateway>,
    pub metrics: Arc<RwLock<AppMetrics>>,
    pub start_time: Instant,
}

/// Counters collected since the server started.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed
    pub request_count: u64,

    /// HTTP responses with a 4xx/5xx status. Transcription failures are
    /// answered with 200 and counted separately below.
    pub error_count: u64,

    pub transcriptions_succeeded: u64,
    pub transcriptions_failed: u64,

    /// Failed transcriptions keyed by `GatewayError::kind`
    pub failures_by_kind: HashMap<String, u64>,

    /// Transcriptions currently being processed
    pub in_flight_transcriptions: u32,

    /// Key: endpoint name (e.g., "POST /transcribe")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig, recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        let stager = AudioStager::new(config.storage.staging_dir.clone());
        let gateway = TranscriptionGateway::new(recognizer, stager, config.speech.sample_rate_hertz);

        Self {
            config: Arc::new(config),
            gateway: Arc::new(gateway),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    // A panic while holding the lock cannot leave the counters in a state
    // worth refusing to read.
    fn metrics_read(&self) -> RwLockReadGuard<'_, AppMetrics> {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn metrics_write(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn increment_request_count(&self) {
        self.metrics_write().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.metrics_write().error_count += 1;
    }

    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics_write();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;
        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Mark a transcription as started. The returned guard must be finished
    /// with the outcome; if it is dropped first (client went away) the
    /// in-flight gauge is still released.
    pub fn track_transcription(&self) -> TranscriptionTracker {
        self.metrics_write().in_flight_transcriptions += 1;
        TranscriptionTracker {
            state: self.clone(),
            finished: false,
        }
    }

    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics_read().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

pub struct TranscriptionTracker {
    state: AppState,
    finished: bool,
}

impl TranscriptionTracker {
    /// Record the outcome: `None` for success, the error kind otherwise.
    pub fn finish(mut self, failure_kind: Option<&str>) {
        let mut metrics = self.state.metrics_write();
        match failure_kind {
            None => metrics.transcriptions_succeeded += 1,
            Some(kind) => {
                metrics.transcriptions_failed += 1;
                *metrics.failures_by_kind.entry(kind.to_string()).or_default() += 1;
            }
        }
        metrics.in_flight_transcriptions = metrics.in_flight_transcriptions.saturating_sub(1);
        drop(metrics);
        self.finished = true;
    }
}

impl Drop for TranscriptionTracker {
    fn drop(&mut self) {
        if !self.finished {
            let mut metrics = self.state.metrics_write();
            metrics.in_flight_transcriptions = metrics.in_flight_transcriptions.saturating_sub(1);
        }
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
