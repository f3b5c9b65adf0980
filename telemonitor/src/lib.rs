//! Clinical voice telemonitoring around the `voice-severity` core.
//!
//! Patients are registered under a physician, each visit uploads a voice
//! recording that is scored and stored, and physicians follow score trends.

pub mod config;
pub mod patients;
pub mod stats;
pub mod store;
pub mod visit;

pub use config::Config;
pub use patients::{history, patients_for_doctor, register_patient, NewPatient, Patient, PatientId, RegistryError, Sex};
pub use stats::{doctor_overview, patient_stats, CriticalPatient, CriticalThresholds, DoctorOverview, PatientStats, Trend};
pub use store::{JsonStore, MeasurementRecord, StoreError, TelemonitorStore};
pub use visit::{add_note, process_visit, NoteError, VisitError, VisitOutcome};
