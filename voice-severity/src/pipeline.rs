//! Extraction followed by scoring for one voice sample

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audio::VoiceSample;
use crate::error::ExtractionError;
use crate::features::{FeatureExtractor, FeatureVector};
use crate::scoring::{ScoringModel, SeverityScore};

/// Result of analyzing one voice sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub features: FeatureVector,
    pub score: SeverityScore,
}

/// Extract features and score them. Scoring only runs on a complete vector.
pub fn analyze(
    sample: &VoiceSample,
    extractor: &dyn FeatureExtractor,
    model: &ScoringModel,
) -> Result<Analysis, ExtractionError> {
    let features = extractor.extract(sample).map_err(|e| {
        warn!("Voice analysis failed: {}", e);
        e
    })?;
    let score = model.score(&features);

    info!(
        "Analyzed {:.2}s voice sample: score {} (jitter {:.6}, shimmer {:.4}, hnr {:.2}, nhr {:.4}, dfa {:.4}, ppe {:.4})",
        sample.duration(),
        score,
        features.jitter_abs,
        features.shimmer_local,
        features.hnr,
        features.nhr,
        features.dfa,
        features.ppe
    );

    Ok(Analysis { features, score })
}
