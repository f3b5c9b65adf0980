//! Frame grids and small statistics shared by the contour analyses

use std::ops::Range;

/// Centred analysis frames over a sound.
///
/// `count = floor((duration - window) / step) + 1` frames, centred on
/// `first_centre + i * step`, with the grid centred inside the sound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FrameGrid {
    pub count: usize,
    pub first_centre: f64,
    pub step: f64,
}

impl FrameGrid {
    pub fn new(duration: f64, window: f64, step: f64) -> Self {
        if step <= 0.0 || window > duration {
            return Self {
                count: 0,
                first_centre: 0.0,
                step,
            };
        }

        // Tolerance keeps exact multiples of the step from losing a frame to rounding.
        let count = ((duration - window) / step + 1e-9).floor() as usize + 1;
        let first_centre = (duration - (count - 1) as f64 * step) / 2.0;
        Self {
            count,
            first_centre,
            step,
        }
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.count).map(move |i| self.first_centre + i as f64 * self.step)
    }
}

/// Sample range of `len` samples centred at `centre` seconds, kept inside the buffer.
pub(crate) fn centred_range(centre: f64, len: usize, sample_rate: u32, total: usize) -> Range<usize> {
    let len = len.min(total);
    let centre_idx = (centre * f64::from(sample_rate)).round() as isize;
    let start = (centre_idx - (len / 2) as isize).clamp(0, (total - len) as isize) as usize;
    start..start + len
}

/// Sample index range covering `[from, to)` seconds, kept inside the buffer.
pub(crate) fn time_range(from: f64, to: f64, sample_rate: u32, total: usize) -> Range<usize> {
    let sr = f64::from(sample_rate);
    let start = ((from * sr).round().max(0.0) as usize).min(total);
    let end = ((to * sr).round().max(0.0) as usize).min(total);
    start..end.max(start)
}

pub(crate) fn peak_abs(samples: &[f64]) -> f64 {
    samples.iter().fold(0.0f64, |acc, s| acc.max(s.abs()))
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`).
pub(crate) fn population_std(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}
