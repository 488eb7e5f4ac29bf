use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// `GET /` liveness probe. The body is a fixed literal that existing
/// clients match on.
pub async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "message": "Hello, FastAPI is live!" }))
}

/// `GET /ping` liveness probe.
pub async fn ping() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats = Vec::new();
    for (endpoint, metric) in metrics.endpoint_metrics.iter() {
        endpoint_stats.push(json!({
            "endpoint": endpoint,
            "request_count": metric.request_count,
            "error_count": metric.error_count,
            "error_rate": metric.error_rate(),
            "average_duration_ms": metric.average_duration_ms(),
            "total_duration_ms": metric.total_duration_ms
        }));
    }

    let finished = metrics.transcriptions_succeeded + metrics.transcriptions_failed;

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "strategy": state.gateway.strategy()
        },
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "transcriptions": {
            "succeeded": metrics.transcriptions_succeeded,
            "failed": metrics.transcriptions_failed,
            "failure_rate": if finished > 0 {
                metrics.transcriptions_failed as f64 / finished as f64
            } else {
                0.0
            },
            "failures_by_kind": metrics.failures_by_kind,
            "in_flight": metrics.in_flight_transcriptions
        },
        "endpoints": endpoint_stats
    }))
}
