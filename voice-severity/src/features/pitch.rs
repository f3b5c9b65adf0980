//! Pitch contour
//!
//! ## Algorithm
//! 1. Frame the sound with a window of three pitch-floor periods, 10 ms apart
//! 2. Mark frames quieter than a fraction of the global peak as unvoiced
//! 3. Use the McLeod algorithm to find F0 in the remaining frames
//! 4. Keep only F0 values inside the pitch floor/ceiling range
//!
//! Unvoiced frames stay in the contour as `None` so that callers can tell
//! where voicing starts and stops.

use pitch_detection::detector::mcleod::McLeodDetector;
use pitch_detection::detector::PitchDetector;

use super::frames::{centred_range, peak_abs, FrameGrid};
use super::params::ExtractionParams;
use crate::audio::VoiceSample;

/// Frames shorter than this cannot hold a pitch-floor period
const MIN_FRAME_SAMPLES: usize = 4;

/// One contour frame: centre time (s) and F0 (Hz) if voiced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchFrame {
    pub time: f64,
    pub frequency: Option<f64>,
}

/// A stretch of consecutive voiced frames
#[derive(Debug, Clone, PartialEq)]
pub struct VoicedRun {
    /// Start of the run (s)
    pub start: f64,
    /// End of the run (s)
    pub end: f64,
    /// `(time, f0)` of every frame in the run
    pub frames: Vec<(f64, f64)>,
}

impl VoicedRun {
    /// F0 of the frame nearest to `time`
    pub fn frequency_at(&self, time: f64) -> f64 {
        let idx = self.frames.partition_point(|(t, _)| *t < time);
        let candidates = [idx.checked_sub(1), Some(idx)];
        candidates
            .iter()
            .flatten()
            .filter_map(|&i| self.frames.get(i))
            .min_by(|a, b| (a.0 - time).abs().total_cmp(&(b.0 - time).abs()))
            .map(|(_, f0)| *f0)
            .unwrap_or(self.frames[0].1)
    }
}

/// Pitch values sampled on a regular time grid
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitchContour {
    pub step: f64,
    pub frames: Vec<PitchFrame>,
}

impl PitchContour {
    /// F0 values of the voiced frames, in time order
    pub fn voiced_values(&self) -> Vec<f64> {
        self.frames.iter().filter_map(|f| f.frequency).collect()
    }

    /// Group consecutive voiced frames into runs covering ±half a step around each frame
    pub fn voiced_runs(&self, duration: f64) -> Vec<VoicedRun> {
        let half_step = self.step / 2.0;
        let mut runs = Vec::new();
        let mut current: Vec<(f64, f64)> = Vec::new();

        for frame in &self.frames {
            match frame.frequency {
                Some(f0) => current.push((frame.time, f0)),
                None if !current.is_empty() => {
                    runs.push(std::mem::take(&mut current));
                }
                None => {}
            }
        }
        if !current.is_empty() {
            runs.push(current);
        }

        runs.into_iter()
            .map(|frames| VoicedRun {
                start: (frames[0].0 - half_step).max(0.0),
                end: (frames[frames.len() - 1].0 + half_step).min(duration),
                frames,
            })
            .collect()
    }
}

/// Compute the pitch contour of a voice sample.
pub fn pitch_contour(sample: &VoiceSample, params: &ExtractionParams) -> PitchContour {
    let samples = sample.samples();
    let sample_rate = sample.sample_rate();
    let window = params.pitch_window();
    let frame_len = (window * f64::from(sample_rate)).round() as usize;
    let grid = FrameGrid::new(sample.duration(), window, params.time_step);

    let mut contour = PitchContour {
        step: params.time_step,
        frames: Vec::with_capacity(grid.count),
    };
    if grid.count == 0 || frame_len < MIN_FRAME_SAMPLES {
        return contour;
    }

    let global_peak = peak_abs(samples);
    let silence = params.pitch_silence_threshold * global_peak;
    let mut detector = McLeodDetector::<f64>::new(frame_len, frame_len / 2);

    for time in grid.times() {
        let range = centred_range(time, frame_len, sample_rate, samples.len());
        let frame = &samples[range];

        let frequency = if frame.len() != frame_len || global_peak == 0.0 || peak_abs(frame) < silence {
            None
        } else {
            detector
                .get_pitch(frame, sample_rate as usize, 0.0, params.pitch_clarity_threshold)
                .map(|pitch| pitch.frequency)
                .filter(|f0| f0.is_finite() && *f0 >= params.pitch_floor && *f0 <= params.pitch_ceiling)
        };

        contour.frames.push(PitchFrame { time, frequency });
    }

    contour
}
