//! Fuzz testing for WAV decoding and feature extraction
//!
//! Any byte string must either be rejected by the decoder or produce a
//! finite feature vector and an in-range score, never a panic.
//!
//! Run with: cargo +nightly fuzz run fuzz_wav_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use voice_severity::{analyze, AcousticExtractor, Feature, ScoringModel, VoiceSample};

fuzz_target!(|data: &[u8]| {
    let Ok(sample) = VoiceSample::from_wav_bytes(data) else {
        return;
    };

    // Keep individual runs short
    if sample.samples().len() > 48_000 {
        return;
    }

    if let Ok(analysis) = analyze(&sample, &AcousticExtractor::default(), &ScoringModel::default()) {
        for feature in Feature::ALL {
            assert!(analysis.features.get(feature).is_finite());
        }
        let score = analysis.score.value();
        assert!((0.0..=108.0).contains(&score));
    }
});
