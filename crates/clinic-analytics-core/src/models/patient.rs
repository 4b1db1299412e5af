//! Patient aggregates and engagement status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Engagement state of a patient, derived from visit history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PatientStatus {
    /// No past visits yet, or exactly one
    Nuevo,
    /// Returning patient with a recent visit
    Activo,
    /// Five or more visits in the trailing year
    Frecuente,
    /// Four to eight calendar months since the last visit
    EnRiesgo,
    /// Nine or more calendar months since the last visit
    Inactivo,
}

impl PatientStatus {
    /// Human-readable label for dashboards.
    pub fn label(&self) -> &'static str {
        match self {
            PatientStatus::Nuevo => "Nuevo",
            PatientStatus::Activo => "Activo",
            PatientStatus::Frecuente => "Frecuente",
            PatientStatus::EnRiesgo => "En riesgo",
            PatientStatus::Inactivo => "Inactivo",
        }
    }

    /// Everything except `Inactivo` counts as an active patient.
    pub fn is_active(&self) -> bool {
        !matches!(self, PatientStatus::Inactivo)
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Deduplicated representation of one patient across all their visits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientAggregate {
    /// `canonical(name) + "|" + normalized(phone)`; unique per aggregate
    pub canonical_key: String,
    /// Display name taken from the most recent visit
    pub display_name: String,
    /// Normalized phone shared by every visit in the aggregate
    pub primary_phone: String,
    /// Visits at or before the computation instant
    pub total_past_visits: u32,
    /// Visits after the computation instant
    pub total_future_visits: u32,
    /// Earliest visit, past or future
    pub first_visit_timestamp: DateTime<Utc>,
    /// Most recent past visit; absent when every visit is in the future
    pub last_visit_timestamp: Option<DateTime<Utc>>,
    /// Earliest future visit
    pub next_future_visit_timestamp: Option<DateTime<Utc>>,
    pub status: PatientStatus,
    /// Practitioners seen, sorted and deduplicated
    #[serde(default)]
    pub practitioners: Vec<String>,
}

impl PatientAggregate {
    /// Check whether the patient has an upcoming appointment.
    pub fn has_upcoming_visit(&self) -> bool {
        self.next_future_visit_timestamp.is_some()
    }
}

/// A resolved patient together with the visit history used to derive it.
///
/// Only the aggregate is persisted; the history lives for one computation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPatient {
    pub patient: PatientAggregate,
    /// Past visit instants, ascending
    pub past_visits: Vec<DateTime<Utc>>,
}

impl ResolvedPatient {
    /// Mean gap in days between consecutive past visits.
    pub fn mean_return_gap_days(&self) -> Option<f64> {
        if self.past_visits.len() < 2 {
            return None;
        }

        let gaps: Vec<f64> = self
            .past_visits
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_seconds() as f64 / 86_400.0)
            .collect();

        Some(gaps.iter().sum::<f64>() / gaps.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn aggregate(status: PatientStatus) -> PatientAggregate {
        let first = Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap();
        PatientAggregate {
            canonical_key: "ana garcia|+5491122334455".into(),
            display_name: "Ana García".into(),
            primary_phone: "+5491122334455".into(),
            total_past_visits: 1,
            total_future_visits: 0,
            first_visit_timestamp: first,
            last_visit_timestamp: Some(first),
            next_future_visit_timestamp: None,
            status,
            practitioners: vec!["Dra. López".into()],
        }
    }

    #[test]
    fn test_status_activity() {
        assert!(PatientStatus::Nuevo.is_active());
        assert!(PatientStatus::EnRiesgo.is_active());
        assert!(!PatientStatus::Inactivo.is_active());
        assert_eq!(PatientStatus::EnRiesgo.to_string(), "En riesgo");
    }

    #[test]
    fn test_aggregate_serde_roundtrip() {
        let patient = aggregate(PatientStatus::Nuevo);
        let json = serde_json::to_string(&patient).unwrap();
        let back: PatientAggregate = serde_json::from_str(&json).unwrap();

        assert_eq!(back, patient);
        assert!(json.contains("\"status\":\"Nuevo\""));
        assert!(!back.has_upcoming_visit());
    }

    #[test]
    fn test_mean_return_gap() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let resolved = ResolvedPatient {
            patient: aggregate(PatientStatus::Activo),
            past_visits: vec![start, start + Duration::days(10), start + Duration::days(40)],
        };

        // Gaps of 10 and 30 days
        assert_eq!(resolved.mean_return_gap_days(), Some(20.0));
    }

    #[test]
    fn test_mean_return_gap_single_visit() {
        let resolved = ResolvedPatient {
            patient: aggregate(PatientStatus::Nuevo),
            past_visits: vec![Utc::now()],
        };
        assert_eq!(resolved.mean_return_gap_days(), None);
    }
}
