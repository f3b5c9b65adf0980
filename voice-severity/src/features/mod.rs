//! Acoustic feature extraction
//!
//! Six measures describe a voice sample:
//!
//! - **jitter_abs** - mean absolute period-to-period difference (s)
//! - **shimmer_local** - mean relative amplitude difference between periods
//! - **hnr** - mean harmonic-to-noise ratio (dB)
//! - **nhr** - noise-to-harmonic ratio, `1 / (hnr + ε)`, or `1.0` when `hnr <= 0`
//! - **dfa** - coefficient of variation of the intensity contour
//! - **ppe** - dispersion of consecutive pitch differences
//!
//! Extraction either returns all six as finite numbers or fails; silent,
//! very short or unvoiced audio falls back to the neutral values described
//! on each measure rather than failing.

mod frames;
pub mod harmonicity;
pub mod intensity;
pub mod params;
pub mod perturbation;
pub mod pitch;
pub mod point_process;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::VoiceSample;
use crate::error::ExtractionError;

pub use params::ExtractionParams;

/// The six measures, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    JitterAbs,
    ShimmerLocal,
    Hnr,
    Nhr,
    Dfa,
    Ppe,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::JitterAbs,
        Feature::ShimmerLocal,
        Feature::Hnr,
        Feature::Nhr,
        Feature::Dfa,
        Feature::Ppe,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::JitterAbs => "jitter_abs",
            Feature::ShimmerLocal => "shimmer_local",
            Feature::Hnr => "hnr",
            Feature::Nhr => "nhr",
            Feature::Dfa => "dfa",
            Feature::Ppe => "ppe",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Complete set of acoustic measures for one voice sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub jitter_abs: f64,
    pub shimmer_local: f64,
    pub hnr: f64,
    pub nhr: f64,
    pub dfa: f64,
    pub ppe: f64,
}

impl FeatureVector {
    /// Build a vector, rejecting any non-finite field.
    pub fn new(
        jitter_abs: f64,
        shimmer_local: f64,
        hnr: f64,
        nhr: f64,
        dfa: f64,
        ppe: f64,
    ) -> Result<Self, ExtractionError> {
        let vector = Self {
            jitter_abs,
            shimmer_local,
            hnr,
            nhr,
            dfa,
            ppe,
        };
        match Feature::ALL.into_iter().find(|f| !vector.get(*f).is_finite()) {
            Some(field) => Err(ExtractionError::NonFinite { field }),
            None => Ok(vector),
        }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::JitterAbs => self.jitter_abs,
            Feature::ShimmerLocal => self.shimmer_local,
            Feature::Hnr => self.hnr,
            Feature::Nhr => self.nhr,
            Feature::Dfa => self.dfa,
            Feature::Ppe => self.ppe,
        }
    }

    /// Copy with one field replaced
    pub fn with(mut self, feature: Feature, value: f64) -> Self {
        match feature {
            Feature::JitterAbs => self.jitter_abs = value,
            Feature::ShimmerLocal => self.shimmer_local = value,
            Feature::Hnr => self.hnr = value,
            Feature::Nhr => self.nhr = value,
            Feature::Dfa => self.dfa = value,
            Feature::Ppe => self.ppe = value,
        }
        self
    }
}

/// Turns a voice sample into a feature vector.
///
/// Keeps the acoustic analysis behind one seam so scoring never depends on it.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, sample: &VoiceSample) -> Result<FeatureVector, ExtractionError>;
}

/// Extractor built on the pitch, point-process, harmonicity and intensity analyses
#[derive(Debug, Clone, Default)]
pub struct AcousticExtractor {
    params: ExtractionParams,
}

impl AcousticExtractor {
    pub fn new(params: ExtractionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ExtractionParams {
        &self.params
    }
}

impl FeatureExtractor for AcousticExtractor {
    fn extract(&self, sample: &VoiceSample) -> Result<FeatureVector, ExtractionError> {
        let params = &self.params;
        params.validate()?;

        let contour = pitch::pitch_contour(sample, params);
        let pulses = point_process::point_process(sample, &contour);
        let jitter_abs = perturbation::jitter_absolute(&pulses.pulses, params);
        let shimmer_local = perturbation::shimmer_local(sample, &pulses.pulses, params);

        let hnr_frames = harmonicity::harmonicity(sample, params);
        let hnr = harmonicity::mean_hnr(&hnr_frames).unwrap_or(0.0);
        let nhr = noise_to_harmonic_ratio(hnr, params.epsilon);

        let intensity: Vec<f64> = intensity::intensity_contour(sample, params)
            .into_iter()
            .flatten()
            .collect();
        let dfa = intensity_variability(&intensity, params);

        let pitch_values = contour.voiced_values();
        let ppe = pitch_perturbation_dispersion(&pitch_values, params);

        debug!(
            "Extracted features: {} pulses, {} pitch frames ({} voiced), {} intensity frames",
            pulses.len(),
            contour.frames.len(),
            pitch_values.len(),
            intensity.len()
        );

        FeatureVector::new(jitter_abs, shimmer_local, hnr, nhr, dfa, ppe)
    }
}

/// `1 / (hnr + ε)` for positive HNR, otherwise the unvoiced sentinel `1.0`.
///
/// Any `hnr <= 0` counts as maximally noisy, including no voiced frames at all.
pub fn noise_to_harmonic_ratio(hnr: f64, epsilon: f64) -> f64 {
    if hnr > 0.0 {
        1.0 / (hnr + epsilon)
    } else {
        1.0
    }
}

/// Coefficient of variation of the defined intensity samples, or `0.0` with
/// too few samples.
pub fn intensity_variability(values: &[f64], params: &ExtractionParams) -> f64 {
    if values.len() <= params.min_intensity_samples {
        return 0.0;
    }
    match (frames::population_std(values), frames::mean(values)) {
        (Some(std), Some(mean)) => std / (mean + params.epsilon),
        _ => 0.0,
    }
}

/// Dispersion of first differences of the voiced pitch values, or `0.0` with
/// too few samples.
pub fn pitch_perturbation_dispersion(values: &[f64], params: &ExtractionParams) -> f64 {
    if values.len() <= params.min_pitch_samples {
        return 0.0;
    }
    let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let abs_diffs: Vec<f64> = diffs.iter().map(|d| d.abs()).collect();
    match (frames::population_std(&diffs), frames::mean(&abs_diffs)) {
        (Some(std), Some(mean_abs)) => std / (mean_abs + params.epsilon),
        _ => 0.0,
    }
}
