//! Score trends per patient and across a physician's patients

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use voice_severity::round_to_hundredths;

use crate::patients::Patient;
use crate::store::{MeasurementRecord, StoreError, TelemonitorStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Worsening,
    Improving,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Worsening => write!(f, "Worsening"),
            Trend::Improving => write!(f, "Improving"),
        }
    }
}

/// Summary of one patient's measurements
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatientStats {
    pub count: usize,
    pub first: Option<f64>,
    pub last: Option<f64>,
    /// last - first
    pub change: Option<f64>,
    pub trend: Option<Trend>,
}

/// Summarize measurements given in ascending time order.
pub fn patient_stats(measurements: &[MeasurementRecord]) -> PatientStats {
    let (Some(first), Some(last)) = (measurements.first(), measurements.last()) else {
        return PatientStats::default();
    };
    let first = first.score.value();
    let last = last.score.value();
    let trend = if last > first { Trend::Worsening } else { Trend::Improving };

    PatientStats {
        count: measurements.len(),
        first: Some(first),
        last: Some(last),
        change: Some(last - first),
        trend: Some(trend),
    }
}

/// When a patient needs attention
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriticalThresholds {
    /// Latest score above this is critical
    pub last_score: f64,
    /// Increase since the first measurement above this is critical
    pub change: f64,
}

impl Default for CriticalThresholds {
    fn default() -> Self {
        Self {
            last_score: 30.0,
            change: 10.0,
        }
    }
}

impl CriticalThresholds {
    pub fn is_critical(&self, last: f64, change: f64) -> bool {
        last > self.last_score || change > self.change
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalPatient {
    pub patient: Patient,
    pub last: f64,
    pub change: f64,
}

/// Physician dashboard numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorOverview {
    pub patient_count: usize,
    /// Mean change across patients with at least two measurements, None without patients
    pub mean_trend: Option<f64>,
    /// Highest latest score first
    pub critical: Vec<CriticalPatient>,
}

pub fn doctor_overview(
    store: &dyn TelemonitorStore,
    doctor: &str,
    thresholds: &CriticalThresholds,
) -> Result<DoctorOverview, StoreError> {
    let patients = store.patients_for_doctor(doctor)?;
    let mut changes = Vec::new();
    let mut critical = Vec::new();

    for patient in patients.iter() {
        let measurements = store.measurements(&patient.codice_fiscale)?;
        if measurements.len() < 2 {
            continue;
        }
        let stats = patient_stats(&measurements);
        let (Some(last), Some(change)) = (stats.last, stats.change) else {
            continue;
        };
        changes.push(change);
        if thresholds.is_critical(last, change) {
            critical.push(CriticalPatient {
                patient: patient.clone(),
                last,
                change,
            });
        }
    }

    critical.sort_by(|a, b| b.last.partial_cmp(&a.last).unwrap_or(Ordering::Equal));

    let mean_trend = if patients.is_empty() {
        None
    } else if changes.is_empty() {
        Some(0.0)
    } else {
        Some(round_to_hundredths(changes.iter().sum::<f64>() / changes.len() as f64))
    };

    debug!(
        "Overview for {}: {} patients, {} critical",
        doctor,
        patients.len(),
        critical.len()
    );

    Ok(DoctorOverview {
        patient_count: patients.len(),
        mean_trend,
        critical,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patients::PatientId;
    use crate::store::tests::{record_at, test_patient};
    use crate::store::JsonStore;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;

    fn add_scores(store: &mut JsonStore, id: &str, doctor: &str, scores: &[f64]) {
        let patient = test_patient(id, doctor);
        let pid = patient.codice_fiscale.clone();
        store.insert_patient(patient).unwrap();
        let start = Utc::now() - Duration::days(scores.len() as i64);
        for (i, score) in scores.iter().enumerate() {
            store
                .insert_measurement(record_at(&pid, *score, start + Duration::days(i as i64)))
                .unwrap();
        }
    }

    #[test]
    fn test_patient_stats_empty() {
        let stats = patient_stats(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.first, None);
        assert_eq!(stats.trend, None);
    }

    #[test]
    fn test_patient_stats_trend() {
        let id = PatientId::parse("RSSMRA57A41H501Z").unwrap();
        let now = Utc::now();
        let worse = [record_at(&id, 20.0, now - Duration::days(1)), record_at(&id, 26.5, now)];
        let stats = patient_stats(&worse);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.change, Some(6.5));
        assert_eq!(stats.trend, Some(Trend::Worsening));

        let flat = [record_at(&id, 20.0, now - Duration::days(1)), record_at(&id, 20.0, now)];
        assert_eq!(patient_stats(&flat).trend, Some(Trend::Improving));
    }

    #[test]
    fn test_single_measurement_is_improving() {
        let id = PatientId::parse("RSSMRA57A41H501Z").unwrap();
        let stats = patient_stats(&[record_at(&id, 40.0, Utc::now())]);
        assert_eq!(stats.change, Some(0.0));
        assert_eq!(stats.trend, Some(Trend::Improving));
    }

    #[test]
    fn test_overview_without_patients() {
        let dir = tempdir().unwrap();
        let store = JsonStore::load_from_path(dir.path().join("store.json")).unwrap();
        let overview = doctor_overview(&store, "dr.bianchi", &CriticalThresholds::default()).unwrap();
        assert_eq!(overview.patient_count, 0);
        assert_eq!(overview.mean_trend, None);
        assert!(overview.critical.is_empty());
    }

    #[test]
    fn test_overview_patients_without_trends() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::load_from_path(dir.path().join("store.json")).unwrap();
        add_scores(&mut store, "RSSMRA57A41H501Z", "dr.bianchi", &[45.0]);
        let overview = doctor_overview(&store, "dr.bianchi", &CriticalThresholds::default()).unwrap();
        assert_eq!(overview.patient_count, 1);
        assert_eq!(overview.mean_trend, Some(0.0));
        assert!(overview.critical.is_empty());
    }

    #[test]
    fn test_overview_flags_and_sorts_critical() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::load_from_path(dir.path().join("store.json")).unwrap();
        // last above 30
        add_scores(&mut store, "AAAAAA00A00A000A", "dr.bianchi", &[29.0, 31.0]);
        // change above 10
        add_scores(&mut store, "BBBBBB00B00B000B", "dr.bianchi", &[5.0, 16.0]);
        // neither
        add_scores(&mut store, "CCCCCC00C00C000C", "dr.bianchi", &[20.0, 18.0]);
        // worst, but another physician's patient
        add_scores(&mut store, "DDDDDD00D00D000D", "dr.verdi", &[10.0, 90.0]);

        let overview = doctor_overview(&store, "dr.bianchi", &CriticalThresholds::default()).unwrap();
        assert_eq!(overview.patient_count, 3);

        let critical: Vec<&str> = overview
            .critical
            .iter()
            .map(|c| c.patient.codice_fiscale.as_str())
            .collect();
        assert_eq!(critical, vec!["AAAAAA00A00A000A", "BBBBBB00B00B000B"]);
        assert_eq!(overview.critical[1].change, 11.0);

        // (2 + 11 - 2) / 3
        assert_eq!(overview.mean_trend, Some(3.67));
    }

    #[test]
    fn test_thresholds_are_strict() {
        let thresholds = CriticalThresholds::default();
        assert!(!thresholds.is_critical(30.0, 10.0));
        assert!(thresholds.is_critical(30.01, 0.0));
        assert!(thresholds.is_critical(0.0, 10.01));
    }

    #[test]
    fn test_custom_thresholds() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::load_from_path(dir.path().join("store.json")).unwrap();
        add_scores(&mut store, "RSSMRA57A41H501Z", "dr.bianchi", &[10.0, 14.0]);
        let strict = CriticalThresholds {
            last_score: 12.0,
            change: 100.0,
        };
        let overview = doctor_overview(&store, "dr.bianchi", &strict).unwrap();
        assert_eq!(overview.critical.len(), 1);
    }
}
