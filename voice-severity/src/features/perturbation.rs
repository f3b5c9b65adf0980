//! Cycle-to-cycle perturbation: jitter and shimmer
//!
//! Both measures walk consecutive glottal periods from the point process.
//! A period is usable when its length lies inside `[min_period, max_period]`;
//! a pair of periods is compared only when both are usable and the longer is
//! at most `max_period_factor` times the shorter. Shimmer additionally
//! requires the larger period amplitude to be at most `max_amplitude_factor`
//! times the smaller.
//!
//! With no comparable pair both measures fall back to `0.0`.

use super::frames::{peak_abs, time_range};
use super::params::ExtractionParams;
use crate::audio::VoiceSample;

fn period_ok(period: f64, params: &ExtractionParams) -> bool {
    period >= params.min_period && period <= params.max_period
}

fn ratio_ok(a: f64, b: f64, max_factor: f64) -> bool {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    lo > 0.0 && hi / lo <= max_factor
}

fn periods(pulses: &[f64]) -> Vec<f64> {
    pulses.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Indices `i` where periods `i` and `i + 1` may be compared
fn comparable_pairs<'a>(periods: &'a [f64], params: &'a ExtractionParams) -> impl Iterator<Item = usize> + 'a {
    (0..periods.len().saturating_sub(1)).filter(move |&i| {
        let (a, b) = (periods[i], periods[i + 1]);
        period_ok(a, params) && period_ok(b, params) && ratio_ok(a, b, params.max_period_factor)
    })
}

/// Absolute jitter: mean absolute difference between consecutive periods (s).
pub fn jitter_absolute(pulses: &[f64], params: &ExtractionParams) -> f64 {
    let periods = periods(pulses);
    let (sum, count) = comparable_pairs(&periods, params)
        .fold((0.0, 0usize), |(sum, count), i| (sum + (periods[i] - periods[i + 1]).abs(), count + 1));

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Local shimmer: mean absolute difference between consecutive period
/// amplitudes, relative to the mean amplitude of the periods involved.
pub fn shimmer_local(sample: &VoiceSample, pulses: &[f64], params: &ExtractionParams) -> f64 {
    let periods = periods(pulses);
    let samples = sample.samples();
    let amplitudes: Vec<f64> = pulses
        .windows(2)
        .map(|w| {
            let range = time_range(w[0], w[1], sample.sample_rate(), samples.len());
            peak_abs(&samples[range])
        })
        .collect();

    let mut used = vec![false; amplitudes.len()];
    let mut diff_sum = 0.0;
    let mut count = 0usize;

    for i in comparable_pairs(&periods, params) {
        let (a, b) = (amplitudes[i], amplitudes[i + 1]);
        if !ratio_ok(a, b, params.max_amplitude_factor) {
            continue;
        }
        diff_sum += (a - b).abs();
        count += 1;
        used[i] = true;
        used[i + 1] = true;
    }

    if count == 0 {
        return 0.0;
    }

    let involved: Vec<f64> = amplitudes
        .iter()
        .zip(&used)
        .filter_map(|(a, used)| used.then_some(*a))
        .collect();
    let mean_amplitude = involved.iter().sum::<f64>() / involved.len() as f64;

    (diff_sum / count as f64) / mean_amplitude
}
