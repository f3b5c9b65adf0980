//! Glottal pulse marking
//!
//! Places one pulse per glottal cycle inside each voiced run of the pitch
//! contour. Each pulse sits on the absolute-amplitude peak of its cycle; the
//! search window for the next pulse is 0.8–1.2 local periods after the
//! previous one. Peak positions are refined with parabolic interpolation so
//! period differences are not limited to whole samples.

use super::frames::time_range;
use super::pitch::PitchContour;
use crate::audio::VoiceSample;

/// Search window around the expected next pulse, as fractions of the local period
const SEARCH_LOW: f64 = 0.8;
const SEARCH_HIGH: f64 = 1.2;

/// Pulse times (s), strictly increasing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointProcess {
    pub pulses: Vec<f64>,
}

impl PointProcess {
    pub fn len(&self) -> usize {
        self.pulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }
}

/// Build the point process from a sample and its pitch contour.
pub fn point_process(sample: &VoiceSample, contour: &PitchContour) -> PointProcess {
    let mut pulses = Vec::new();

    for run in contour.voiced_runs(sample.duration()) {
        let first_period = 1.0 / run.frames[0].1;
        let Some(mut previous) = peak_time(sample, run.start, run.start + first_period) else {
            continue;
        };
        pulses.push(previous);

        loop {
            let period = 1.0 / run.frequency_at(previous);
            let from = previous + SEARCH_LOW * period;
            let to = previous + SEARCH_HIGH * period;
            if to > run.end {
                break;
            }
            match peak_time(sample, from, to) {
                Some(next) if next > previous => {
                    pulses.push(next);
                    previous = next;
                }
                _ => break,
            }
        }
    }

    PointProcess { pulses }
}

/// Time of the largest absolute sample in `[from, to)`, refined to sub-sample precision.
fn peak_time(sample: &VoiceSample, from: f64, to: f64) -> Option<f64> {
    let samples = sample.samples();
    let range = time_range(from, to, sample.sample_rate(), samples.len());
    if range.is_empty() {
        return None;
    }

    let (idx, _) = samples[range.clone()]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
        .map(|(i, v)| (range.start + i, *v))?;

    let offset = if idx > 0 && idx + 1 < samples.len() {
        let (left, centre, right) = (samples[idx - 1].abs(), samples[idx].abs(), samples[idx + 1].abs());
        let curvature = left - 2.0 * centre + right;
        if curvature < 0.0 {
            (0.5 * (left - right) / curvature).clamp(-0.5, 0.5)
        } else {
            0.0
        }
    } else {
        0.0
    };

    Some((idx as f64 + offset) / f64::from(sample.sample_rate()))
}
