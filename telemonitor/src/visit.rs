//! Visit processing: one uploaded recording in, one stored measurement out.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};
use voice_severity::{analyze, Analysis, ExtractionError, FeatureExtractor, ScoringModel, VoiceSample};

use crate::patients::{InvalidPatientId, PatientId};
use crate::store::{MeasurementRecord, StoreError, TelemonitorStore};

#[derive(Debug, Error)]
pub enum VisitError {
    #[error(transparent)]
    InvalidId(#[from] InvalidPatientId),

    #[error("Patient {0} not found")]
    PatientNotFound(PatientId),

    #[error("Voice analysis failed: {0}")]
    Analysis(#[from] ExtractionError),

    #[error("Failed to store measurement: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum NoteError {
    #[error(transparent)]
    InvalidId(#[from] InvalidPatientId),

    /// Also returned for unknown patients
    #[error("Not authorized to annotate measurements of this patient")]
    NotAuthorized,

    #[error("Failed to store note: {0}")]
    Storage(#[from] StoreError),
}

/// What a processed visit produced
#[derive(Debug, Clone, PartialEq)]
pub struct VisitOutcome {
    pub record: MeasurementRecord,
    /// True if this visit established the patient's baseline
    pub baseline_set: bool,
}

impl VisitOutcome {
    pub fn analysis(&self) -> Analysis {
        Analysis {
            features: self.record.features,
            score: self.record.score,
        }
    }
}

/// Analyze an uploaded WAV recording and record it for the patient.
///
/// The patient must exist before any audio is analyzed. A recording that
/// cannot be analyzed leaves the store untouched.
pub fn process_visit(
    store: &mut dyn TelemonitorStore,
    extractor: &dyn FeatureExtractor,
    model: &ScoringModel,
    patient_id: &str,
    wav_bytes: &[u8],
) -> Result<VisitOutcome, VisitError> {
    let id = PatientId::parse(patient_id)?;
    if store.patient(&id)?.is_none() {
        warn!("Visit for unknown patient {}", id);
        return Err(VisitError::PatientNotFound(id));
    }

    let sample = VoiceSample::from_wav_bytes(wav_bytes)?;
    let analysis = analyze(&sample, extractor, model)?;

    let record = MeasurementRecord::new(id.clone(), analysis.score, analysis.features);
    let baseline_set = store.record_visit(record.clone())?;

    info!("Recorded visit for {}: score {}", id, analysis.score);
    Ok(VisitOutcome { record, baseline_set })
}

/// Attach a physician note to the measurement taken at `timestamp`.
pub fn add_note(
    store: &mut dyn TelemonitorStore,
    doctor: &str,
    patient_id: &str,
    timestamp: DateTime<Utc>,
    note: &str,
) -> Result<(), NoteError> {
    let id = PatientId::parse(patient_id)?;
    match store.patient(&id)? {
        Some(patient) if patient.doctor == doctor => {}
        _ => {
            warn!("{} tried to annotate patient {}", doctor, id);
            return Err(NoteError::NotAuthorized);
        }
    }

    store.set_note(&id, timestamp, note)?;
    info!("Note added for {} at {}", id, timestamp);
    Ok(())
}
