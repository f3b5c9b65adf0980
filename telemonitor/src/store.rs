//! Persistence for patients and voice measurements.
//!
//! `TelemonitorStore` is the seam the visit and statistics code talks to.
//! `JsonStore` keeps everything in one JSON document on disk and rewrites it
//! after every mutation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use voice_severity::{FeatureVector, SeverityScore};

use crate::patients::{Patient, PatientId};

/// Current schema version for the store document
const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to get home directory")]
    NoHomeDir,

    #[error("Patient {0} not found")]
    PatientNotFound(PatientId),

    #[error("Patient {0} already exists")]
    DuplicatePatient(PatientId),

    #[error("No measurement for patient {patient} at {timestamp}")]
    MeasurementNotFound {
        patient: PatientId,
        timestamp: DateTime<Utc>,
    },
}

/// One scored voice recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub id: Uuid,
    pub codice_fiscale: PatientId,
    pub timestamp: DateTime<Utc>,
    pub score: SeverityScore,
    pub features: FeatureVector,
    /// Physician annotation
    pub note: Option<String>,
}

impl MeasurementRecord {
    /// New un-annotated record stamped now
    pub fn new(codice_fiscale: PatientId, score: SeverityScore, features: FeatureVector) -> Self {
        Self {
            id: Uuid::new_v4(),
            codice_fiscale,
            timestamp: Utc::now(),
            score,
            features,
            note: None,
        }
    }
}

pub trait TelemonitorStore {
    fn patient(&self, id: &PatientId) -> Result<Option<Patient>, StoreError>;

    /// Fails with `DuplicatePatient` if the fiscal code is taken.
    fn insert_patient(&mut self, patient: Patient) -> Result<(), StoreError>;

    fn patients_for_doctor(&self, doctor: &str) -> Result<Vec<Patient>, StoreError>;

    fn insert_measurement(&mut self, record: MeasurementRecord) -> Result<(), StoreError>;

    /// Record the baseline score unless one is already set.
    /// Returns whether the baseline was written.
    fn set_baseline_if_unset(&mut self, id: &PatientId, score: f64) -> Result<bool, StoreError>;

    /// Store a visit's measurement and set the baseline if unset, as one
    /// change. Returns whether the baseline was written.
    fn record_visit(&mut self, record: MeasurementRecord) -> Result<bool, StoreError>;

    /// All measurements of a patient, oldest first
    fn measurements(&self, id: &PatientId) -> Result<Vec<MeasurementRecord>, StoreError>;

    fn set_note(&mut self, id: &PatientId, timestamp: DateTime<Utc>, note: &str) -> Result<(), StoreError>;
}

/// On-disk document with schema versioning
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreDocument {
    schema_version: u32,
    patients: Vec<Patient>,
    measurements: Vec<MeasurementRecord>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            patients: Vec::new(),
            measurements: Vec::new(),
        }
    }
}

/// JSON file backed store
#[derive(Debug)]
pub struct JsonStore {
    document: StoreDocument,
    path: PathBuf,
}

impl JsonStore {
    /// `~/.telemonitor/store.json`
    pub fn default_path() -> Result<PathBuf, StoreError> {
        let home = dirs::home_dir().ok_or(StoreError::NoHomeDir)?;
        Ok(home.join(".telemonitor").join("store.json"))
    }

    /// Load the store from a specific path; a missing file is an empty store.
    pub fn load_from_path(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let document = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            let document: StoreDocument = serde_json::from_str(&content)?;

            if document.schema_version != SCHEMA_VERSION {
                warn!(
                    "Store schema version mismatch: {} vs {}, may need migration",
                    document.schema_version, SCHEMA_VERSION
                );
            }

            info!(
                "Loaded {} patients and {} measurements from {:?}",
                document.patients.len(),
                document.measurements.len(),
                path
            );
            document
        } else {
            debug!("No store file found at {:?}, using empty store", path);
            StoreDocument::default()
        };

        Ok(Self { document, path })
    }

    /// Write the document atomically with owner-only permissions
    pub fn save(&self) -> Result<(), StoreError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| StoreError::Io { path, source }
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let content = serde_json::to_string_pretty(&self.document)?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content).map_err(io_err(&temp_path))?;

        // Health data: owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&temp_path, permissions).map_err(io_err(&temp_path))?;
        }

        std::fs::rename(&temp_path, &self.path).map_err(io_err(&self.path))?;

        debug!(
            "Saved {} patients and {} measurements to {:?}",
            self.document.patients.len(),
            self.document.measurements.len(),
            self.path
        );
        Ok(())
    }

    /// Apply a change and persist it, restoring the in-memory document if
    /// either step fails.
    fn update<T>(&mut self, change: impl FnOnce(&mut StoreDocument) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let snapshot = self.document.clone();
        let result = change(&mut self.document).and_then(|value| self.save().map(|()| value));
        if result.is_err() {
            self.document = snapshot;
        }
        result
    }
}

impl StoreDocument {
    fn patient_mut(&mut self, id: &PatientId) -> Option<&mut Patient> {
        self.patients.iter_mut().find(|p| &p.codice_fiscale == id)
    }

    fn push_measurement(&mut self, record: MeasurementRecord) -> Result<(), StoreError> {
        if self.patient_mut(&record.codice_fiscale).is_none() {
            return Err(StoreError::PatientNotFound(record.codice_fiscale));
        }
        debug!("Recording measurement {} for {}", record.id, record.codice_fiscale);
        self.measurements.push(record);
        Ok(())
    }

    fn baseline_if_unset(&mut self, id: &PatientId, score: f64) -> Result<bool, StoreError> {
        let patient = self
            .patient_mut(id)
            .ok_or_else(|| StoreError::PatientNotFound(id.clone()))?;
        if patient.baseline_score.is_some() {
            return Ok(false);
        }
        patient.baseline_score = Some(score);
        info!("Baseline for {} set to {:.2}", id, score);
        Ok(true)
    }
}

impl TelemonitorStore for JsonStore {
    fn patient(&self, id: &PatientId) -> Result<Option<Patient>, StoreError> {
        Ok(self
            .document
            .patients
            .iter()
            .find(|p| &p.codice_fiscale == id)
            .cloned())
    }

    fn insert_patient(&mut self, patient: Patient) -> Result<(), StoreError> {
        self.update(|doc| {
            if doc.patient_mut(&patient.codice_fiscale).is_some() {
                return Err(StoreError::DuplicatePatient(patient.codice_fiscale));
            }
            doc.patients.push(patient);
            Ok(())
        })
    }

    fn patients_for_doctor(&self, doctor: &str) -> Result<Vec<Patient>, StoreError> {
        Ok(self
            .document
            .patients
            .iter()
            .filter(|p| p.doctor == doctor)
            .cloned()
            .collect())
    }

    fn insert_measurement(&mut self, record: MeasurementRecord) -> Result<(), StoreError> {
        self.update(|doc| doc.push_measurement(record))
    }

    fn set_baseline_if_unset(&mut self, id: &PatientId, score: f64) -> Result<bool, StoreError> {
        self.update(|doc| doc.baseline_if_unset(id, score))
    }

    fn record_visit(&mut self, record: MeasurementRecord) -> Result<bool, StoreError> {
        self.update(|doc| {
            let id = record.codice_fiscale.clone();
            let score = record.score.value();
            doc.push_measurement(record)?;
            doc.baseline_if_unset(&id, score)
        })
    }

    fn measurements(&self, id: &PatientId) -> Result<Vec<MeasurementRecord>, StoreError> {
        let mut records: Vec<MeasurementRecord> = self
            .document
            .measurements
            .iter()
            .filter(|m| &m.codice_fiscale == id)
            .cloned()
            .collect();
        records.sort_by_key(|m| m.timestamp);
        Ok(records)
    }

    fn set_note(&mut self, id: &PatientId, timestamp: DateTime<Utc>, note: &str) -> Result<(), StoreError> {
        self.update(|doc| {
            let record = doc
                .measurements
                .iter_mut()
                .find(|m| &m.codice_fiscale == id && m.timestamp == timestamp)
                .ok_or_else(|| StoreError::MeasurementNotFound {
                    patient: id.clone(),
                    timestamp,
                })?;
            record.note = Some(note.to_string());
            Ok(())
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::patients::Sex;
    use chrono::Duration;
    use tempfile::tempdir;
    use voice_severity::ScoringModel;

    pub(crate) fn test_patient(id: &str, doctor: &str) -> Patient {
        Patient {
            codice_fiscale: PatientId::parse(id).unwrap(),
            first_name: "Luca".to_string(),
            last_name: "Ferri".to_string(),
            age: 72,
            sex: Sex::M,
            doctor: doctor.to_string(),
            baseline_score: None,
            baseline_date: Utc::now(),
        }
    }

    pub(crate) fn record_at(id: &PatientId, score: f64, timestamp: DateTime<Utc>) -> MeasurementRecord {
        let model = ScoringModel::default();
        let features = model.reference.means();
        let mut record = MeasurementRecord::new(id.clone(), model.score(&features), features);
        record.timestamp = timestamp;
        record.score = SeverityScore::try_from(score).unwrap();
        record
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let store = JsonStore::load_from_path(dir.path().join("store.json")).unwrap();
        let id = PatientId::parse("RSSMRA57A41H501Z").unwrap();
        assert!(store.patient(&id).unwrap().is_none());
        assert!(store.measurements(&id).unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let mut store = JsonStore::load_from_path(&path).unwrap();
        let patient = test_patient("RSSMRA57A41H501Z", "dr.bianchi");
        let id = patient.codice_fiscale.clone();
        store.insert_patient(patient.clone()).unwrap();
        store.insert_measurement(record_at(&id, 25.5, Utc::now())).unwrap();

        let reloaded = JsonStore::load_from_path(&path).unwrap();
        assert_eq!(reloaded.patient(&id).unwrap(), Some(patient));
        let measurements = reloaded.measurements(&id).unwrap();
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].score.value(), 25.5);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_store_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = JsonStore::load_from_path(&path).unwrap();
        store.insert_patient(test_patient("RSSMRA57A41H501Z", "dr.bianchi")).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_duplicate_patient_rejected() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::load_from_path(dir.path().join("store.json")).unwrap();
        store.insert_patient(test_patient("RSSMRA57A41H501Z", "dr.bianchi")).unwrap();
        let result = store.insert_patient(test_patient("RSSMRA57A41H501Z", "dr.verdi"));
        assert!(matches!(result, Err(StoreError::DuplicatePatient(_))));
    }

    #[test]
    fn test_measurement_requires_patient() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::load_from_path(dir.path().join("store.json")).unwrap();
        let id = PatientId::parse("RSSMRA57A41H501Z").unwrap();
        let result = store.insert_measurement(record_at(&id, 20.0, Utc::now()));
        assert!(matches!(result, Err(StoreError::PatientNotFound(_))));
    }

    #[test]
    fn test_measurements_sorted_ascending() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::load_from_path(dir.path().join("store.json")).unwrap();
        let patient = test_patient("RSSMRA57A41H501Z", "dr.bianchi");
        let id = patient.codice_fiscale.clone();
        store.insert_patient(patient).unwrap();

        let now = Utc::now();
        store.insert_measurement(record_at(&id, 30.0, now)).unwrap();
        store.insert_measurement(record_at(&id, 10.0, now - Duration::days(2))).unwrap();
        store.insert_measurement(record_at(&id, 20.0, now - Duration::days(1))).unwrap();

        let scores: Vec<f64> = store.measurements(&id).unwrap().iter().map(|m| m.score.value()).collect();
        assert_eq!(scores, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_baseline_is_set_once() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::load_from_path(dir.path().join("store.json")).unwrap();
        let patient = test_patient("RSSMRA57A41H501Z", "dr.bianchi");
        let id = patient.codice_fiscale.clone();
        store.insert_patient(patient).unwrap();

        assert!(store.set_baseline_if_unset(&id, 0.0).unwrap());
        assert!(!store.set_baseline_if_unset(&id, 40.0).unwrap());
        assert_eq!(store.patient(&id).unwrap().unwrap().baseline_score, Some(0.0));
    }

    #[test]
    fn test_set_note_addresses_by_timestamp() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::load_from_path(dir.path().join("store.json")).unwrap();
        let patient = test_patient("RSSMRA57A41H501Z", "dr.bianchi");
        let id = patient.codice_fiscale.clone();
        store.insert_patient(patient).unwrap();

        let now = Utc::now();
        let earlier = now - Duration::hours(3);
        store.insert_measurement(record_at(&id, 22.0, earlier)).unwrap();
        store.insert_measurement(record_at(&id, 23.0, now)).unwrap();

        store.set_note(&id, earlier, "tremor at rest").unwrap();
        let measurements = store.measurements(&id).unwrap();
        assert_eq!(measurements[0].note.as_deref(), Some("tremor at rest"));
        assert_eq!(measurements[1].note, None);

        let missing = store.set_note(&id, now + Duration::seconds(1), "nope");
        assert!(matches!(missing, Err(StoreError::MeasurementNotFound { .. })));
    }

    /// A directory at the temp-file path makes every save fail, even for root
    fn block_saves(path: &Path) {
        std::fs::create_dir(path.with_extension("json.tmp")).unwrap();
    }

    #[test]
    fn test_failed_save_leaves_memory_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = JsonStore::load_from_path(&path).unwrap();
        let patient = test_patient("RSSMRA57A41H501Z", "dr.bianchi");
        let id = patient.codice_fiscale.clone();
        store.insert_patient(patient).unwrap();
        store.insert_measurement(record_at(&id, 20.0, Utc::now() - Duration::hours(1))).unwrap();

        block_saves(&path);

        let result = store.insert_measurement(record_at(&id, 25.0, Utc::now()));
        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert_eq!(store.measurements(&id).unwrap().len(), 1);

        let result = store.set_baseline_if_unset(&id, 25.0);
        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert_eq!(store.patient(&id).unwrap().unwrap().baseline_score, None);

        let timestamp = store.measurements(&id).unwrap()[0].timestamp;
        assert!(store.set_note(&id, timestamp, "lost").is_err());
        assert_eq!(store.measurements(&id).unwrap()[0].note, None);

        let other = test_patient("VRDGPP50A01F205X", "dr.bianchi");
        let other_id = other.codice_fiscale.clone();
        assert!(store.insert_patient(other).is_err());
        assert!(store.patient(&other_id).unwrap().is_none());

        let on_disk = JsonStore::load_from_path(&path).unwrap();
        assert_eq!(on_disk.measurements(&id).unwrap(), store.measurements(&id).unwrap());
    }

    #[test]
    fn test_record_visit_sets_baseline_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = JsonStore::load_from_path(&path).unwrap();
        let patient = test_patient("RSSMRA57A41H501Z", "dr.bianchi");
        let id = patient.codice_fiscale.clone();
        store.insert_patient(patient).unwrap();

        let now = Utc::now();
        assert!(store.record_visit(record_at(&id, 18.0, now - Duration::days(1))).unwrap());
        assert!(!store.record_visit(record_at(&id, 40.0, now)).unwrap());

        let reloaded = JsonStore::load_from_path(&path).unwrap();
        assert_eq!(reloaded.patient(&id).unwrap().unwrap().baseline_score, Some(18.0));
        assert_eq!(reloaded.measurements(&id).unwrap().len(), 2);
    }

    #[test]
    fn test_record_visit_unknown_patient() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::load_from_path(dir.path().join("store.json")).unwrap();
        let id = PatientId::parse("RSSMRA57A41H501Z").unwrap();
        let result = store.record_visit(record_at(&id, 20.0, Utc::now()));
        assert!(matches!(result, Err(StoreError::PatientNotFound(_))));
    }

    #[test]
    fn test_corrupt_file_is_json_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ definitely not json").unwrap();
        assert!(matches!(JsonStore::load_from_path(&path), Err(StoreError::Json(_))));
    }
}
