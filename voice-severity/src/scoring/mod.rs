//! Severity scoring
//!
//! ## Algorithm
//! 1. Standardize each feature against the reference statistics
//! 2. Combine the z-scores linearly with the model weights and intercept
//! 3. Clamp to the score range and round to 2 decimals (ties to even)
//!
//! Scoring is a pure function of the feature vector and the model; it never
//! fails for finite input.

mod model;

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::FeatureVector;

pub use model::{
    FeatureWeights, ModelError, Reference, ReferenceStatistics, ScoreRange, ScoringModel, SCORE_CEILING, SCORE_FLOOR,
};

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("Severity score {0} is outside [0, 108]")]
pub struct InvalidScore(pub f64);

/// Motor severity estimate, higher is more severe
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SeverityScore(f64);

impl SeverityScore {
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for SeverityScore {
    type Error = InvalidScore;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if (SCORE_FLOOR..=SCORE_CEILING).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidScore(value))
        }
    }
}

impl fmt::Display for SeverityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl From<SeverityScore> for f64 {
    fn from(score: SeverityScore) -> Self {
        score.0
    }
}

/// Round to 2 decimal places on the exact binary value, ties to even.
///
/// Goes through fixed-precision formatting, which is correctly rounded;
/// scaling by 100 first can create or break ties.
pub fn round_to_hundredths(value: f64) -> f64 {
    format!("{:.2}", value).parse().unwrap_or(value)
}

impl ScoringModel {
    /// Score a feature vector with this model.
    ///
    /// A NaN raw score (opposite infinite z-scores) clamps to the range maximum.
    pub fn score(&self, features: &FeatureVector) -> SeverityScore {
        let raw = self.raw_score(features);
        let clamped = raw
            .min(self.range.max)
            .max(self.range.min)
            .min(SCORE_CEILING)
            .max(SCORE_FLOOR);
        SeverityScore(round_to_hundredths(clamped))
    }
}

fn default_model() -> &'static ScoringModel {
    static MODEL: OnceLock<ScoringModel> = OnceLock::new();
    MODEL.get_or_init(ScoringModel::default)
}

/// Score a feature vector with the calibrated clinical model.
pub fn score(features: &FeatureVector) -> SeverityScore {
    default_model().score(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Feature;
    use proptest::prelude::*;

    fn reference_means() -> FeatureVector {
        ScoringModel::default().reference.means()
    }

    #[test]
    fn test_reference_means_score_21() {
        let features = FeatureVector {
            jitter_abs: 0.00004,
            shimmer_local: 0.030,
            nhr: 0.025,
            hnr: 21.7,
            dfa: 0.718,
            ppe: 0.206,
        };
        assert_eq!(score(&features).value(), 21.0);
    }

    #[test]
    fn test_clamps_to_maximum() {
        let features = FeatureVector {
            jitter_abs: 0.01,
            shimmer_local: 1.0,
            nhr: 1.0,
            hnr: -50.0,
            dfa: 5.0,
            ppe: 10.0,
        };
        assert!(ScoringModel::default().raw_score(&features) > 108.0);
        assert_eq!(score(&features).value(), 108.0);
    }

    #[test]
    fn test_clamps_to_minimum() {
        let features = FeatureVector {
            jitter_abs: -0.01,
            shimmer_local: -1.0,
            nhr: -1.0,
            hnr: 150.0,
            dfa: -5.0,
            ppe: -10.0,
        };
        assert!(ScoringModel::default().raw_score(&features) < 0.0);
        assert_eq!(score(&features).value(), 0.0);
    }

    #[test]
    fn test_one_std_jitter_adds_weight() {
        let features = reference_means().with(Feature::JitterAbs, 0.00004 + 0.00006);
        assert_eq!(score(&features).value(), 24.2);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_to_hundredths(21.004), 21.0);
        assert_eq!(round_to_hundredths(21.006), 21.01);
        assert_eq!(round_to_hundredths(0.125), 0.12);
        assert_eq!(round_to_hundredths(0.375), 0.38);
    }

    #[test]
    fn test_rounding_uses_exact_binary_value() {
        // 40.725 is stored just above the tie, 60.415 and 2.675 just below
        assert_eq!(round_to_hundredths(40.725), 40.73);
        assert_eq!(round_to_hundredths(60.415), 60.41);
        assert_eq!(round_to_hundredths(2.675), 2.67);
        assert_eq!(round_to_hundredths(1.005), 1.0);
    }

    #[test]
    fn test_opposite_overflowing_z_scores_clamp_to_maximum() {
        let features = FeatureVector {
            jitter_abs: f64::MAX,
            shimmer_local: -f64::MAX,
            ..reference_means()
        };
        assert!(ScoringModel::default().raw_score(&features).is_nan());
        assert_eq!(score(&features).value(), 108.0);
    }

    #[test]
    fn test_score_deserialization_checks_range() {
        let score: SeverityScore = serde_json::from_str("42.5").unwrap();
        assert_eq!(score.value(), 42.5);
        assert!(serde_json::from_str::<SeverityScore>("108.01").is_err());
        assert!(serde_json::from_str::<SeverityScore>("-1.0").is_err());
        assert!(SeverityScore::try_from(f64::NAN).is_err());
    }

    #[test]
    fn test_display_two_decimals() {
        let features = reference_means();
        assert_eq!(score(&features).to_string(), "21.00");
    }

    #[test]
    fn test_custom_model_range() {
        let model = ScoringModel {
            range: ScoreRange { min: 0.0, max: 20.0 },
            ..ScoringModel::default()
        };
        assert_eq!(model.score(&reference_means()).value(), 20.0);
    }

    #[test]
    fn test_serializes_as_number() {
        let json = serde_json::to_string(&score(&reference_means())).unwrap();
        assert_eq!(json, "21.0");
    }

    fn feature_strategy() -> impl Strategy<Value = FeatureVector> {
        (
            -0.001f64..0.001,
            -1.0f64..1.0,
            -100.0f64..100.0,
            -2.0f64..2.0,
            -5.0f64..5.0,
            -5.0f64..5.0,
        )
            .prop_map(|(jitter_abs, shimmer_local, hnr, nhr, dfa, ppe)| FeatureVector {
                jitter_abs,
                shimmer_local,
                hnr,
                nhr,
                dfa,
                ppe,
            })
    }

    proptest! {
        #[test]
        fn prop_score_in_range(features in feature_strategy()) {
            let value = score(&features).value();
            prop_assert!((0.0..=108.0).contains(&value));
        }

        #[test]
        fn prop_extreme_finite_inputs_stay_in_range(
            values in proptest::collection::vec(
                prop_oneof![Just(f64::MAX), Just(-f64::MAX), -1e300f64..1e300],
                6,
            )
        ) {
            let features = FeatureVector {
                jitter_abs: values[0],
                shimmer_local: values[1],
                hnr: values[2],
                nhr: values[3],
                dfa: values[4],
                ppe: values[5],
            };
            let value = score(&features).value();
            prop_assert!((0.0..=108.0).contains(&value), "score {}", value);
        }

        #[test]
        fn prop_score_is_deterministic(features in feature_strategy()) {
            let a = score(&features);
            let b = score(&features);
            prop_assert_eq!(a.value().to_bits(), b.value().to_bits());
        }

        #[test]
        fn prop_perturbation_measures_never_lower_raw(
            features in feature_strategy(),
            delta in 0.0f64..1.0,
            idx in 0usize..5,
        ) {
            let model = ScoringModel::default();
            let feature = [
                Feature::JitterAbs,
                Feature::ShimmerLocal,
                Feature::Nhr,
                Feature::Dfa,
                Feature::Ppe,
            ][idx];
            let bumped = features.with(feature, features.get(feature) + delta);
            prop_assert!(model.raw_score(&bumped) >= model.raw_score(&features));
        }

        #[test]
        fn prop_hnr_never_raises_raw(features in feature_strategy(), delta in 0.0f64..50.0) {
            let model = ScoringModel::default();
            let bumped = features.with(Feature::Hnr, features.hnr + delta);
            prop_assert!(model.raw_score(&bumped) <= model.raw_score(&features));
        }
    }
}
