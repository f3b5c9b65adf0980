//! Intensity contour
//!
//! Hann-windowed mean power in dB relative to the 20 µPa auditory threshold,
//! sampled every `time_step`. The local mean is removed before squaring so a
//! DC offset does not read as loudness. Frames with no energy at all are
//! undefined and come back as `None`.

use std::f64::consts::PI;

use super::frames::{centred_range, FrameGrid};
use super::params::ExtractionParams;
use crate::audio::VoiceSample;

/// Reference power: (2e-5)^2
const REFERENCE_POWER: f64 = 4e-10;

/// Per-frame intensity in dB
pub fn intensity_contour(sample: &VoiceSample, params: &ExtractionParams) -> Vec<Option<f64>> {
    let samples = sample.samples();
    let window = params.intensity_window();
    let frame_len = (window * f64::from(sample.sample_rate())).round() as usize;
    let grid = FrameGrid::new(sample.duration(), window, params.time_step);
    if grid.count == 0 || frame_len < 2 {
        return Vec::new();
    }

    let weights: Vec<f64> = (0..frame_len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * (i as f64 + 0.5) / frame_len as f64).cos())
        .collect();
    let weight_sum: f64 = weights.iter().sum();

    grid.times()
        .map(|time| {
            let range = centred_range(time, frame_len, sample.sample_rate(), samples.len());
            let frame = &samples[range];
            if frame.len() != frame_len {
                return None;
            }

            let local_mean = frame.iter().zip(&weights).map(|(s, w)| s * w).sum::<f64>() / weight_sum;
            let power = frame
                .iter()
                .zip(&weights)
                .map(|(s, w)| w * (s - local_mean).powi(2))
                .sum::<f64>()
                / weight_sum;

            if power > 0.0 {
                Some(10.0 * (power / REFERENCE_POWER).log10())
            } else {
                None
            }
        })
        .collect()
}
