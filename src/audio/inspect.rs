//! RIFF/WAV header inspection.
//!
//! The provider is told the audio is 16-bit linear PCM at the configured
//! sample rate. When the upload's own header disagrees the provider usually
//! answers with a confusing error, so mismatches are logged up front. Nothing
//! here rejects an upload.

use std::io::Cursor;

/// Format fields read from a WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSummary {
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

const WAV_FORMAT_PCM: u16 = 1;

/// Parse the header of a WAV payload. `None` when the bytes are not WAV.
pub fn inspect_wav(bytes: &[u8]) -> Option<WavSummary> {
    let mut reader = Cursor::new(bytes);
    let (header, _) = wav::read(&mut reader).ok()?;
    Some(WavSummary {
        audio_format: header.audio_format,
        channels: header.channel_count,
        sample_rate: header.sampling_rate,
        bits_per_sample: header.bits_per_sample,
    })
}

/// Differences between the upload and what the recognition config declares.
pub fn format_mismatches(summary: &WavSummary, expected_sample_rate: u32) -> Vec<String> {
    let mut mismatches = Vec::new();

    if summary.audio_format != WAV_FORMAT_PCM {
        mismatches.push(format!("audio format {} is not linear PCM", summary.audio_format));
    }
    if summary.bits_per_sample != 16 {
        mismatches.push(format!("{}-bit samples, expected 16-bit", summary.bits_per_sample));
    }
    if summary.sample_rate != expected_sample_rate {
        mismatches.push(format!(
            "sample rate {} Hz, expected {} Hz",
            summary.sample_rate, expected_sample_rate
        ));
    }
    if summary.channels != 1 {
        mismatches.push(format!("{} channels, expected mono", summary.channels));
    }

    mismatches
}
