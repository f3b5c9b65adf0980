//! Extraction configuration

use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

/// Analysis constants for the acoustic feature extractor.
///
/// The defaults are the clinical settings the scoring model was calibrated
/// against; changing them shifts every feature away from its reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionParams {
    /// Lowest pitch considered voiced (Hz)
    pub pitch_floor: f64,
    /// Highest pitch considered voiced (Hz)
    pub pitch_ceiling: f64,
    /// Frame step for pitch, harmonicity and intensity contours (s)
    pub time_step: f64,

    /// Pitch window length in periods of the pitch floor
    pub pitch_periods_per_window: f64,
    /// Minimum McLeod clarity for a pitch frame to count as voiced
    pub pitch_clarity_threshold: f64,
    /// Frames quieter than this fraction of the global peak are unvoiced
    pub pitch_silence_threshold: f64,

    /// Shortest period accepted by the perturbation measures (s)
    pub min_period: f64,
    /// Longest period accepted by the perturbation measures (s)
    pub max_period: f64,
    /// Largest ratio between consecutive periods
    pub max_period_factor: f64,
    /// Largest ratio between consecutive period amplitudes (shimmer)
    pub max_amplitude_factor: f64,

    /// Harmonicity frames quieter than this fraction of the global peak are unvoiced
    pub hnr_silence_threshold: f64,
    /// Harmonicity window length in periods of the pitch floor
    pub hnr_periods_per_window: f64,

    /// Minimum pitch that sets the intensity window length (Hz)
    pub intensity_min_pitch: f64,

    /// Guard added to denominators
    pub epsilon: f64,
    /// Intensity samples needed before DFA is computed (strictly more than)
    pub min_intensity_samples: usize,
    /// Pitch samples needed before PPE is computed (strictly more than)
    pub min_pitch_samples: usize,
}

impl Default for ExtractionParams {
    fn default() -> Self {
        Self {
            pitch_floor: 75.0,
            pitch_ceiling: 500.0,
            time_step: 0.01,
            pitch_periods_per_window: 3.0,
            pitch_clarity_threshold: 0.45,
            pitch_silence_threshold: 0.03,
            min_period: 0.0001,
            max_period: 0.02,
            max_period_factor: 1.3,
            max_amplitude_factor: 1.6,
            hnr_silence_threshold: 0.1,
            hnr_periods_per_window: 1.0,
            intensity_min_pitch: 100.0,
            epsilon: 1e-6,
            min_intensity_samples: 10,
            min_pitch_samples: 5,
        }
    }
}

impl ExtractionParams {
    /// Check that every constant keeps the frame arithmetic well defined.
    pub fn validate(&self) -> Result<(), ExtractionError> {
        fn check(name: &'static str, ok: bool, reason: &'static str) -> Result<(), ExtractionError> {
            if ok {
                Ok(())
            } else {
                Err(ExtractionError::InvalidParameter { name, reason })
            }
        }
        fn positive(value: f64) -> bool {
            value.is_finite() && value > 0.0
        }
        fn fraction(value: f64) -> bool {
            (0.0..=1.0).contains(&value)
        }
        fn ratio(value: f64) -> bool {
            value.is_finite() && value >= 1.0
        }

        check("pitch_floor", positive(self.pitch_floor), "must be finite and positive")?;
        check(
            "pitch_ceiling",
            self.pitch_ceiling.is_finite() && self.pitch_ceiling > self.pitch_floor,
            "must be finite and above pitch_floor",
        )?;
        check("time_step", positive(self.time_step), "must be finite and positive")?;
        check(
            "pitch_periods_per_window",
            positive(self.pitch_periods_per_window),
            "must be finite and positive",
        )?;
        check("pitch_clarity_threshold", fraction(self.pitch_clarity_threshold), "must be within [0, 1]")?;
        check("pitch_silence_threshold", fraction(self.pitch_silence_threshold), "must be within [0, 1]")?;
        check("min_period", positive(self.min_period), "must be finite and positive")?;
        check(
            "max_period",
            self.max_period.is_finite() && self.max_period > self.min_period,
            "must be finite and above min_period",
        )?;
        check("max_period_factor", ratio(self.max_period_factor), "must be finite and at least 1")?;
        check("max_amplitude_factor", ratio(self.max_amplitude_factor), "must be finite and at least 1")?;
        check("hnr_silence_threshold", fraction(self.hnr_silence_threshold), "must be within [0, 1]")?;
        check(
            "hnr_periods_per_window",
            positive(self.hnr_periods_per_window),
            "must be finite and positive",
        )?;
        check("intensity_min_pitch", positive(self.intensity_min_pitch), "must be finite and positive")?;
        check("epsilon", positive(self.epsilon), "must be finite and positive")?;
        Ok(())
    }

    /// Pitch analysis window (s)
    pub fn pitch_window(&self) -> f64 {
        self.pitch_periods_per_window / self.pitch_floor
    }

    /// Harmonicity comparison window (s)
    pub fn harmonicity_window(&self) -> f64 {
        self.hnr_periods_per_window / self.pitch_floor
    }

    /// Physical intensity window (s); the effective Hann duration is half of it
    pub fn intensity_window(&self) -> f64 {
        6.4 / self.intensity_min_pitch
    }
}
