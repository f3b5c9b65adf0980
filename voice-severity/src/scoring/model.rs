//! Scoring model: reference statistics, weights and score range
//!
//! The default model is the calibrated clinical one. A recalibrated model can
//! be loaded from JSON without touching the scoring arithmetic.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::features::{Feature, FeatureVector};

/// Lowest severity on the clinical scale
pub const SCORE_FLOOR: f64 = 0.0;
/// Highest severity on the clinical scale
pub const SCORE_CEILING: f64 = 108.0;

/// Errors that can occur while loading a scoring model
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to read scoring model {path:?}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse scoring model: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Reference std for {0} must be finite and positive")]
    InvalidStd(Feature),

    #[error("Reference mean for {0} must be finite")]
    InvalidMean(Feature),

    #[error("Weight for {0} must be finite")]
    InvalidWeight(Feature),

    #[error("Intercept must be finite")]
    InvalidIntercept,

    #[error("Score range [{min}, {max}] is not an ordered interval within [0, 108]")]
    InvalidRange { min: f64, max: f64 },
}

/// Population mean and standard deviation of one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub mean: f64,
    pub std: f64,
}

impl Reference {
    pub const fn new(mean: f64, std: f64) -> Self {
        Self { mean, std }
    }

    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }
}

/// Reference statistics for every feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceStatistics {
    pub jitter_abs: Reference,
    pub shimmer_local: Reference,
    pub hnr: Reference,
    pub nhr: Reference,
    pub dfa: Reference,
    pub ppe: Reference,
}

impl ReferenceStatistics {
    pub fn get(&self, feature: Feature) -> Reference {
        match feature {
            Feature::JitterAbs => self.jitter_abs,
            Feature::ShimmerLocal => self.shimmer_local,
            Feature::Hnr => self.hnr,
            Feature::Nhr => self.nhr,
            Feature::Dfa => self.dfa,
            Feature::Ppe => self.ppe,
        }
    }

    /// A feature vector sitting exactly on the reference means
    pub fn means(&self) -> FeatureVector {
        FeatureVector {
            jitter_abs: self.jitter_abs.mean,
            shimmer_local: self.shimmer_local.mean,
            hnr: self.hnr.mean,
            nhr: self.nhr.mean,
            dfa: self.dfa.mean,
            ppe: self.ppe.mean,
        }
    }
}

impl Default for ReferenceStatistics {
    fn default() -> Self {
        Self {
            jitter_abs: Reference::new(0.00004, 0.00006),
            shimmer_local: Reference::new(0.030, 0.018),
            hnr: Reference::new(21.7, 4.3),
            nhr: Reference::new(0.025, 0.040),
            dfa: Reference::new(0.718, 0.055),
            ppe: Reference::new(0.206, 0.090),
        }
    }
}

/// Weight applied to each feature's z-score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeights {
    pub jitter_abs: f64,
    pub shimmer_local: f64,
    pub hnr: f64,
    pub nhr: f64,
    pub dfa: f64,
    pub ppe: f64,
}

impl FeatureWeights {
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
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            jitter_abs: 3.2,
            shimmer_local: 2.8,
            hnr: -1.8,
            nhr: 2.5,
            dfa: 2.1,
            ppe: 1.9,
        }
    }
}

/// Closed interval the score is clamped to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: f64,
    pub max: f64,
}

impl Default for ScoreRange {
    fn default() -> Self {
        Self {
            min: SCORE_FLOOR,
            max: SCORE_CEILING,
        }
    }
}

/// Linear severity model over standardized features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringModel {
    pub intercept: f64,
    pub weights: FeatureWeights,
    pub reference: ReferenceStatistics,
    pub range: ScoreRange,
}

impl Default for ScoringModel {
    fn default() -> Self {
        Self {
            intercept: 21.0,
            weights: FeatureWeights::default(),
            reference: ReferenceStatistics::default(),
            range: ScoreRange::default(),
        }
    }
}

impl ScoringModel {
    /// Parse and validate a model from JSON; missing sections keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    /// Load a model file
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let model = Self::from_json_str(&content)?;
        info!("Loaded scoring model from {:?}", path);
        Ok(model)
    }

    /// Check that every constant keeps the score arithmetic finite.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.intercept.is_finite() {
            return Err(ModelError::InvalidIntercept);
        }
        for feature in Feature::ALL {
            let reference = self.reference.get(feature);
            if !reference.mean.is_finite() {
                return Err(ModelError::InvalidMean(feature));
            }
            if !(reference.std.is_finite() && reference.std > 0.0) {
                return Err(ModelError::InvalidStd(feature));
            }
            if !self.weights.get(feature).is_finite() {
                return Err(ModelError::InvalidWeight(feature));
            }
        }
        let ScoreRange { min, max } = self.range;
        if !(SCORE_FLOOR <= min && min <= max && max <= SCORE_CEILING) {
            return Err(ModelError::InvalidRange { min, max });
        }
        Ok(())
    }

    /// Standardized value of one feature
    pub fn z_score(&self, features: &FeatureVector, feature: Feature) -> f64 {
        self.reference.get(feature).z_score(features.get(feature))
    }

    /// Weighted sum before clamping and rounding
    pub fn raw_score(&self, features: &FeatureVector) -> f64 {
        // Summed in the calibrated order: jitter, shimmer, nhr, hnr, dfa, ppe
        const ORDER: [Feature; 6] = [
            Feature::JitterAbs,
            Feature::ShimmerLocal,
            Feature::Nhr,
            Feature::Hnr,
            Feature::Dfa,
            Feature::Ppe,
        ];
        ORDER.iter().fold(self.intercept, |acc, &feature| {
            acc + self.weights.get(feature) * self.z_score(features, feature)
        })
    }
}
