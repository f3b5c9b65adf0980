//! Harmonicity (HNR) by the cross-correlation method
//!
//! ## Algorithm
//! 1. Frame the sound every 10 ms; each frame holds one comparison window
//!    (`periods_per_window / pitch_floor`) plus the longest lag (`1 / pitch_floor`)
//! 2. Frames quieter than `silence_threshold` of the global peak are unvoiced
//! 3. Cross-correlate the window with the lagged signal via FFT and normalise
//!    each lag by the energies of both windows
//! 4. Take the highest local maximum over lags `[1/ceiling, 1/floor]`,
//!    refined with parabolic interpolation
//! 5. HNR = 10·log10(r / (1 − r)) dB
//!
//! The reported HNR is the mean over voiced frames.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use super::frames::{centred_range, peak_abs, FrameGrid};
use super::params::ExtractionParams;
use crate::audio::VoiceSample;

/// Correlations are kept away from 0 and 1 so the dB value stays finite
const R_MIN: f64 = 1e-9;
const R_MAX: f64 = 1.0 - 1e-9;

/// Per-frame HNR in dB; `None` for unvoiced frames.
pub fn harmonicity(sample: &VoiceSample, params: &ExtractionParams) -> Vec<Option<f64>> {
    let samples = sample.samples();
    let sr = f64::from(sample.sample_rate());

    let window = (params.harmonicity_window() * sr).round() as usize;
    let max_lag = (sr / params.pitch_floor).round() as usize;
    let min_lag = ((sr / params.pitch_ceiling).ceil() as usize).max(1);
    let segment_len = window.saturating_add(max_lag);

    let grid = FrameGrid::new(sample.duration(), segment_len as f64 / sr, params.time_step);
    if grid.count == 0 || window == 0 || min_lag.saturating_add(1) >= max_lag {
        return Vec::new();
    }

    let global_peak = peak_abs(samples);
    let silence = params.hnr_silence_threshold * global_peak;

    let n = (window + segment_len).next_power_of_two();
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    let ifft = planner.plan_fft_inverse(n);

    let mut a_buf = vec![Complex::new(0.0, 0.0); n];
    let mut b_buf = vec![Complex::new(0.0, 0.0); n];
    let mut energy = vec![0.0f64; segment_len + 1];
    let mut r = vec![0.0f64; max_lag + 1];

    grid.times()
        .map(|time| {
            let range = centred_range(time, segment_len, sample.sample_rate(), samples.len());
            let segment = &samples[range];
            if segment.len() != segment_len || global_peak == 0.0 || peak_abs(segment) < silence {
                return None;
            }

            // Prepare FFT inputs (zero-padded)
            for (i, slot) in a_buf.iter_mut().enumerate() {
                *slot = Complex::new(if i < window { segment[i] } else { 0.0 }, 0.0);
            }
            for (i, slot) in b_buf.iter_mut().enumerate() {
                *slot = Complex::new(segment.get(i).copied().unwrap_or(0.0), 0.0);
            }
            fft.process(&mut a_buf);
            fft.process(&mut b_buf);
            for (a, b) in a_buf.iter_mut().zip(&b_buf) {
                *a = a.conj() * b;
            }
            ifft.process(&mut a_buf);

            // Prefix energies of the lagged signal
            energy[0] = 0.0;
            for (i, s) in segment.iter().enumerate() {
                energy[i + 1] = energy[i] + s * s;
            }
            let e0 = energy[window];
            if e0 <= 0.0 {
                return None;
            }

            let scale = 1.0 / n as f64;
            for (lag, value) in r.iter_mut().enumerate() {
                let e_lag = energy[lag + window] - energy[lag];
                *value = if e_lag > 0.0 {
                    a_buf[lag].re * scale / (e0 * e_lag).sqrt()
                } else {
                    0.0
                };
            }

            best_local_maximum(&r, min_lag, max_lag)
                .filter(|peak| *peak > 0.0)
                .map(|peak| {
                    let peak = peak.clamp(R_MIN, R_MAX);
                    10.0 * (peak / (1.0 - peak)).log10()
                })
        })
        .collect()
}

/// Highest interior local maximum of `r` over `[min_lag, max_lag)`, parabolically refined.
fn best_local_maximum(r: &[f64], min_lag: usize, max_lag: usize) -> Option<f64> {
    (min_lag.max(1)..max_lag.min(r.len() - 1))
        .filter(|&lag| r[lag] > r[lag - 1] && r[lag] >= r[lag + 1])
        .map(|lag| {
            let (left, centre, right) = (r[lag - 1], r[lag], r[lag + 1]);
            let curvature = left - 2.0 * centre + right;
            if curvature < 0.0 {
                let offset = 0.5 * (left - right) / curvature;
                centre - 0.25 * (left - right) * offset
            } else {
                centre
            }
        })
        .max_by(f64::total_cmp)
}

/// Mean HNR over voiced frames, `None` when nothing was voiced.
pub fn mean_hnr(frames: &[Option<f64>]) -> Option<f64> {
    let voiced: Vec<f64> = frames.iter().flatten().copied().collect();
    if voiced.is_empty() {
        None
    } else {
        Some(voiced.iter().sum::<f64>() / voiced.len() as f64)
    }
}
