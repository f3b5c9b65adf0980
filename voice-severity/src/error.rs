use thiserror::Error;

use crate::features::Feature;

/// Errors that can occur while turning audio into a feature vector.
///
/// Degenerate but decodable audio (silence, very short clips, no voicing) is
/// not an error; it yields a vector built from the fallback values instead.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Audio contains no samples")]
    EmptyAudio,

    #[error("Unsupported sample rate: {rate} Hz (need at least {min} Hz)")]
    UnsupportedSampleRate { rate: u32, min: u32 },

    #[error("Audio contains non-finite samples")]
    InvalidSamples,

    #[error("Failed to decode WAV audio: {0}")]
    Decode(#[from] hound::Error),

    #[error("Invalid extraction parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: &'static str },

    #[error("Analysis produced a non-finite value for {field}")]
    NonFinite { field: Feature },
}
