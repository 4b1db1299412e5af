//! Clinic-wide retention and growth KPIs.

use chrono::{DateTime, Duration, FixedOffset, Utc};

use super::{in_same_month, round1};
use crate::models::{KpiSnapshot, PatientStatus, ResolvedPatient};

/// Cohort window for second-appointment retention, in days before `now`.
/// The lag keeps very recent first visits from dragging the rate down.
pub const RETENTION_WINDOW_DAYS: (i64, i64) = (60, 90);

/// Lag before the churn reference point, in days.
pub const CHURN_LAG_DAYS: i64 = 90;

/// Span of the churn cohort before the reference point, in days.
pub const CHURN_COHORT_DAYS: i64 = 365;

/// Compute the KPI snapshot for a resolved patient set as of `now`.
pub fn compute_kpis(patients: &[ResolvedPatient], now: DateTime<FixedOffset>) -> KpiSnapshot {
    let active = patients
        .iter()
        .filter(|p| p.patient.status.is_active())
        .count() as u32;

    KpiSnapshot {
        total_active_patients: active,
        new_patients_this_month: new_patients_this_month(patients, now),
        at_risk_patients: patients
            .iter()
            .filter(|p| p.patient.status == PatientStatus::EnRiesgo)
            .count() as u32,
        second_appointment_retention_rate: second_appointment_retention_rate(patients, now),
        visit_frequency_per_year: visit_frequency_per_year(patients, active),
        quarterly_churn_rate: quarterly_churn_rate(patients, now),
        average_return_time_days: average_return_time_days(patients),
        last_updated: Some(now.with_timezone(&Utc)),
    }
}

/// Patients whose first visit falls in the current calendar month.
pub fn new_patients_this_month(patients: &[ResolvedPatient], now: DateTime<FixedOffset>) -> u32 {
    patients
        .iter()
        .filter(|p| in_same_month(p.patient.first_visit_timestamp, now))
        .count() as u32
}

/// Percentage of the (now-90d, now-60d) first-visit cohort with more than one past visit.
pub fn second_appointment_retention_rate(patients: &[ResolvedPatient], now: DateTime<FixedOffset>) -> f64 {
    let now = now.with_timezone(&Utc);
    let (near, far) = RETENTION_WINDOW_DAYS;
    let window_start = now - Duration::days(far);
    let window_end = now - Duration::days(near);

    let cohort: Vec<&ResolvedPatient> = patients
        .iter()
        .filter(|p| {
            let first = p.patient.first_visit_timestamp;
            first > window_start && first < window_end
        })
        .collect();

    let returned = cohort
        .iter()
        .filter(|p| p.patient.total_past_visits > 1)
        .count();

    percentage(returned, cohort.len())
}

/// All-time past visits divided by currently active patients.
///
/// Not an annualized rate: the numerator spans the whole harvest window while
/// the denominator is a point-in-time count. Kept as a coarse indicator.
pub fn visit_frequency_per_year(patients: &[ResolvedPatient], active_patients: u32) -> f64 {
    if active_patients == 0 {
        return 0.0;
    }

    let total_visits: u64 = patients
        .iter()
        .map(|p| u64::from(p.patient.total_past_visits))
        .sum();

    round1(total_visits as f64 / f64::from(active_patients))
}

/// Percentage of patients last seen in the year before `now - 90d` who are now `Inactivo`.
pub fn quarterly_churn_rate(patients: &[ResolvedPatient], now: DateTime<FixedOffset>) -> f64 {
    let reference = now.with_timezone(&Utc) - Duration::days(CHURN_LAG_DAYS);
    let cohort_start = reference - Duration::days(CHURN_COHORT_DAYS);

    let cohort: Vec<&ResolvedPatient> = patients
        .iter()
        .filter(|p| {
            p.patient
                .last_visit_timestamp
                .is_some_and(|last| last >= cohort_start && last <= reference)
        })
        .collect();

    let churned = cohort
        .iter()
        .filter(|p| p.patient.status == PatientStatus::Inactivo)
        .count();

    percentage(churned, cohort.len())
}

/// Mean over returning patients of their mean gap between visits, whole days.
pub fn average_return_time_days(patients: &[ResolvedPatient]) -> u32 {
    let gaps: Vec<f64> = patients
        .iter()
        .filter_map(ResolvedPatient::mean_return_gap_days)
        .collect();

    if gaps.is_empty() {
        return 0;
    }

    let mean = gaps.iter().sum::<f64>() / gaps.len() as f64;
    mean.round().max(0.0) as u32
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round1(part as f64 * 100.0 / whole as f64)
}
