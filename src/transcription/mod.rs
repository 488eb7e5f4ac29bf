//! # Transcription Module
//!
//! Turns a staged upload into a transcript by delegating to a remote speech
//! provider.
//!
//! ## Key Components:
//! - **RecognitionRequest**: encoding, sample rate, language, model and diarization
//!   settings sent with every job
//! - **SpeechRecognizer**: the capability every strategy implements
//! - **LongRunningRecognizer**: object-storage upload + polled long-running job
//! - **RestRecognizer**: synchronous call with inline base64 audio and an API key
//! - **TranscriptionGateway**: the request pipeline (precondition check, staging,
//!   recognition, transcript assembly)
//!
//! ## Strategy selection:
//! `speech.strategy` in the configuration picks the recognizer once at
//! startup (see [`factory::build_recognizer`]). Both strategies produce the
//! same [`RecognitionResult`] and the same error taxonomy.

pub mod factory;
pub mod gateway;
pub mod long_running;
pub mod request;
pub mod response;
pub mod rest;
pub mod result;

pub use factory::build_recognizer;
pub use gateway::TranscriptionGateway;
pub use request::RecognitionRequest;
pub use response::GatewayResponse;
pub use result::RecognitionResult;

use async_trait::async_trait;

use crate::audio::StagedAudio;
use crate::error::GatewayResult;

/// A way of getting a [`RecognitionResult`] out of a staged upload.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    /// Check that the credentials this strategy needs are present.
    /// Must not touch the network.
    fn ensure_configured(&self) -> GatewayResult<()>;

    /// Run recognition. Takes ownership of the staged file and removes it as
    /// soon as its bytes have been uploaded or encoded.
    async fn recognize(&self, audio: StagedAudio) -> GatewayResult<RecognitionResult>;
}
