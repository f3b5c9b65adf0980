//! Voice biomarker extraction and motor-severity scoring
//!
//! Turns one recorded voice sample into six acoustic measures and maps them
//! to a bounded severity score.
//!
//! ## Pipeline
//!
//! ```text
//!   WAV bytes / file
//!          |
//!          v
//!     VoiceSample (mono, f64)
//!          |
//!          v
//!   FeatureExtractor ── pitch contour ── point process ── jitter / shimmer
//!          |          ── harmonicity ── HNR / NHR
//!          |          ── intensity contour ── DFA
//!          |          ── pitch differences ── PPE
//!          v
//!     FeatureVector
//!          |
//!          v
//!   ScoringModel (z-scores against reference statistics, weighted sum, clamp)
//!          |
//!          v
//!     SeverityScore [0, 108]
//! ```
//!
//! Both stages are synchronous and hold no state between calls, so separate
//! samples can be analyzed on separate threads.

pub mod audio;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod scoring;

pub use audio::VoiceSample;
pub use error::ExtractionError;
pub use features::{AcousticExtractor, ExtractionParams, Feature, FeatureExtractor, FeatureVector};
pub use pipeline::{analyze, Analysis};
pub use scoring::{round_to_hundredths, score, InvalidScore, ModelError, ScoringModel, SeverityScore};
