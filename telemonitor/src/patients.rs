//! Patient registry
//!
//! Patients are keyed by their 16-character fiscal code, stored upper-case.
//! Each patient belongs to exactly one physician.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::store::{MeasurementRecord, StoreError, TelemonitorStore};

/// Length of a fiscal code
const PATIENT_ID_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid patient id {0:?}: expected 16 letters or digits")]
pub struct InvalidPatientId(pub String);

/// Upper-cased 16-character alphanumeric fiscal code
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PatientId(String);

impl PatientId {
    pub fn parse(raw: &str) -> Result<Self, InvalidPatientId> {
        let upper = raw.trim().to_uppercase();
        if upper.len() == PATIENT_ID_LEN && upper.chars().all(|c| c.is_ascii_alphanumeric()) {
            Ok(Self(upper))
        } else {
            Err(InvalidPatientId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PatientId {
    type Err = InvalidPatientId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PatientId {
    type Error = InvalidPatientId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PatientId> for String {
    fn from(id: PatientId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    M,
    F,
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "M" => Ok(Self::M),
            "F" => Ok(Self::F),
            _ => Err(format!("Unknown sex: {} (expected M or F)", s)),
        }
    }
}

/// A registered patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub codice_fiscale: PatientId,
    pub first_name: String,
    pub last_name: String,
    pub age: u32,
    pub sex: Sex,
    /// Username of the responsible physician
    pub doctor: String,
    /// Score of the first recorded visit, set once
    pub baseline_score: Option<f64>,
    /// Registration time
    pub baseline_date: DateTime<Utc>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Registration form
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub age: u32,
    pub sex: Sex,
    pub doctor: String,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    InvalidId(#[from] InvalidPatientId),

    #[error("Patient {0} is already registered")]
    Duplicate(PatientId),

    #[error("Storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for RegistryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicatePatient(id) => RegistryError::Duplicate(id),
            other => RegistryError::Storage(other),
        }
    }
}

/// Register a new patient under their physician.
pub fn register_patient(store: &mut dyn TelemonitorStore, form: NewPatient) -> Result<Patient, RegistryError> {
    let id = PatientId::parse(&form.id)?;
    let patient = Patient {
        codice_fiscale: id,
        first_name: form.first_name,
        last_name: form.last_name,
        age: form.age,
        sex: form.sex,
        doctor: form.doctor,
        baseline_score: None,
        baseline_date: Utc::now(),
    };

    store.insert_patient(patient.clone())?;
    info!("Registered patient {} for {}", patient.codice_fiscale, patient.doctor);
    Ok(patient)
}

/// Patients followed by one physician, ordered by last then first name.
pub fn patients_for_doctor(store: &dyn TelemonitorStore, doctor: &str) -> Result<Vec<Patient>, StoreError> {
    let mut patients = store.patients_for_doctor(doctor)?;
    patients.sort_by(|a, b| {
        a.last_name
            .cmp(&b.last_name)
            .then_with(|| a.first_name.cmp(&b.first_name))
    });
    Ok(patients)
}

/// Patient record plus measurements, newest first.
pub fn history(
    store: &dyn TelemonitorStore,
    id: &PatientId,
) -> Result<Option<(Patient, Vec<MeasurementRecord>)>, StoreError> {
    let Some(patient) = store.patient(id)? else {
        return Ok(None);
    };
    let mut measurements = store.measurements(id)?;
    measurements.reverse();
    Ok(Some((patient, measurements)))
}
