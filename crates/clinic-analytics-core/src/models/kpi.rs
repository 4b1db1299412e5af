//! Clinic-wide KPI and chart models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PatientAggregate;

/// Clinic-wide retention and growth metrics, overwritten wholesale each pass.
///
/// Rates are percentages rounded to one decimal place.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KpiSnapshot {
    /// Patients whose status is not `Inactivo`
    pub total_active_patients: u32,
    /// Patients whose first visit falls in the current calendar month
    pub new_patients_this_month: u32,
    /// Patients whose status is `EnRiesgo`
    pub at_risk_patients: u32,
    /// Share of the 60-90 day cohort that came back for a second visit
    pub second_appointment_retention_rate: f64,
    /// All-time past visits over currently active patients
    pub visit_frequency_per_year: f64,
    /// Share of recently-active patients that are now `Inactivo`
    pub quarterly_churn_rate: f64,
    /// Mean of per-patient mean gaps between visits, whole days
    pub average_return_time_days: u32,
    /// Computation instant; `None` for the never-computed snapshot
    pub last_updated: Option<DateTime<Utc>>,
}

impl KpiSnapshot {
    /// The all-zero snapshot reported before anything was computed.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Visit counts for one calendar month of the dashboard chart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthlyBucket {
    /// Short month label, e.g. "Ene"
    pub month_label: String,
    pub year: i32,
    /// Month number, 1-12
    pub month: u32,
    /// Visits that were the patient's first visit
    pub new_patient_count: u32,
    /// All other past visits in the month
    pub recurring_patient_count: u32,
}

impl MonthlyBucket {
    pub fn total(&self) -> u32 {
        self.new_patient_count + self.recurring_patient_count
    }
}

/// Everything the dashboard renders: KPIs, the patient directory and the chart.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsSnapshot {
    pub kpis: KpiSnapshot,
    pub patients: Vec<PatientAggregate>,
    pub monthly_buckets: Vec<MonthlyBucket>,
}

impl AnalyticsSnapshot {
    /// Snapshot of an empty clinic: zero KPIs, no patients, no buckets.
    pub fn empty() -> Self {
        Self::default()
    }
}
