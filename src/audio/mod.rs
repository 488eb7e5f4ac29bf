//! # Audio Intake
//!
//! Everything that happens to an upload before a recognizer sees it.
//!
//! ## Key Components:
//! - **UploadedAudio**: the raw bytes and client filename taken off the multipart body
//! - **Staging**: one uniquely named temporary file per request, removed as soon as
//!   the recognizer no longer needs it
//! - **Inspection**: WAV header checks against the recognition config
//!
//! ## Expected Audio Format:
//! - **Sample Rate**: 16kHz (configurable)
//! - **Bit Depth**: 16-bit linear PCM
//! - **Channels**: Mono

pub mod inspect;
pub mod staging;

pub use staging::{AudioStager, StagedAudio};

/// An upload as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedAudio {
    /// Filename from the multipart content disposition, if any. Only used
    /// for naming the remote object; never validated.
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// Build a 16-bit PCM WAV file in memory.
#[cfg(test)]
pub(crate) fn test_wav(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let block_align = channels * 2;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);

    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }

    bytes
}
