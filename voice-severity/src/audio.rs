//! Voice sample decoding
//!
//! Uploaded recordings arrive as WAV bytes. They are decoded in memory with
//! `hound`, scaled to [-1, 1) and down-mixed to a single channel.

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use tracing::debug;

use crate::error::ExtractionError;

/// Lowest sample rate that still resolves the 500 Hz pitch ceiling.
pub const MIN_SAMPLE_RATE: u32 = 1000;

/// A single-channel voice recording.
///
/// Owned by the caller for the duration of one analysis; nothing in the
/// pipeline keeps a copy.
#[derive(Debug, Clone)]
pub struct VoiceSample {
    samples: Vec<f64>,
    sample_rate: u32,
}

impl VoiceSample {
    /// Wrap raw mono samples.
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Result<Self, ExtractionError> {
        if samples.is_empty() {
            return Err(ExtractionError::EmptyAudio);
        }
        if sample_rate < MIN_SAMPLE_RATE {
            return Err(ExtractionError::UnsupportedSampleRate {
                rate: sample_rate,
                min: MIN_SAMPLE_RATE,
            });
        }
        if samples.iter().any(|s| !s.is_finite()) {
            return Err(ExtractionError::InvalidSamples);
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Decode a WAV stream.
    pub fn from_wav_reader<R: Read>(reader: R) -> Result<Self, ExtractionError> {
        let reader = hound::WavReader::new(reader)?;
        let spec = reader.spec();

        let interleaved: Vec<f64> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .map(|s| s.map(f64::from))
                .collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = (1u64 << (spec.bits_per_sample - 1)) as f64;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| f64::from(v) / scale))
                    .collect::<Result<_, _>>()?
            }
        };

        debug!(
            "Decoded WAV: {} Hz, {} channels, {} bits, {} samples",
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            interleaved.len()
        );

        Self::new(downmix(&interleaved, spec.channels), spec.sample_rate)
    }

    /// Decode WAV bytes held in memory (e.g. an upload).
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self, ExtractionError> {
        Self::from_wav_reader(Cursor::new(bytes))
    }

    /// Decode a WAV file from disk.
    pub fn from_wav_file(path: &Path) -> Result<Self, ExtractionError> {
        let file = File::open(path).map_err(hound::Error::IoError)?;
        debug!("Opened {:?}", path);
        Self::from_wav_reader(BufReader::new(file))
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Average interleaved frames into one channel.
fn downmix(interleaved: &[f64], channels: u16) -> Vec<f64> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let channels = usize::from(channels);
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f64>() / channels as f64)
        .collect()
}
