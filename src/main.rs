//! # Speech Gateway - Main Application Entry Point
//!
//! HTTP front door for a remote speech-to-text provider. Clients post an
//! audio file to `/transcribe` and get back either the transcript or an
//! error message, always with `200 OK`.
//!
//! ## Application Architecture:
//! - **config**: server, speech and storage settings (defaults, `config.toml`, environment)
//! - **auth**: OAuth access tokens for the Google APIs
//! - **audio**: upload staging and WAV inspection
//! - **storage**: object storage uploads for long-running jobs
//! - **transcription**: recognition strategies and the request pipeline
//! - **state**: shared gateway and metrics
//! - **health**: liveness and metrics endpoints
//! - **middleware**: request metrics
//! - **handlers**: the `/transcribe` endpoint
//! - **error**: failure categories and their response rendering

mod audio;
mod auth;
mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod state;
mod storage;
mod transcription;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use crate::config::{AppConfig, Credentials};
use crate::state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Set once SIGTERM or SIGINT arrives.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// ## Startup order:
/// 1. `.env` and logging
/// 2. Configuration load and validation (fatal on error)
/// 3. Credentials from the environment (missing ones are reported per request, not here)
/// 4. Recognizer selection and shared state
/// 5. HTTP server until a shutdown signal or a server error
#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting speech-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let credentials = Credentials::from_env();
    let recognizer = transcription::build_recognizer(&config, &credentials)?;
    if let Err(e) = recognizer.ensure_configured() {
        warn!(strategy = recognizer.name(), "{}; /transcribe will report this until fixed", e);
    }
    info!(
        strategy = recognizer.name(),
        language = %config.speech.language_code,
        model = %config.speech.model,
        "Speech recognizer ready"
    );

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let app_state = AppState::new(config, recognizer);

    setup_signal_handlers();

    info!("Starting HTTP server on {}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            // Middleware runs in reverse order of registration for responses
            .wrap(cors)
            .wrap(TracingLogger::default())
            .wrap(middleware::MetricsMiddleware)
            .route("/", web::get().to(health::root))
            .route("/ping", web::get().to(health::ping))
            .route("/metrics", web::get().to(health::detailed_metrics))
            .route("/transcribe", web::post().to(handlers::transcribe))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            // Lets in-flight transcriptions finish and clean up their files
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Structured logging to the console.
///
/// `RUST_LOG` overrides the default filter
/// `speech_gateway=debug,actix_web=info`.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "speech_gateway=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}

/// Flip [`SHUTDOWN_SIGNAL`] on SIGTERM or SIGINT.
fn setup_signal_handlers() {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async {
        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Resolve once a shutdown has been requested.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
