//! Engagement status classification.
//!
//! A pure function of the past-visit history and the computation instant;
//! no transition history is stored.

use chrono::{DateTime, FixedOffset, Utc};

use super::{calendar_months_between, months_before};
use crate::models::PatientStatus;

/// Calendar months without a visit before a patient is `Inactivo`.
pub const INACTIVE_AFTER_MONTHS: i64 = 9;

/// Calendar months without a visit before a patient is `EnRiesgo`.
pub const AT_RISK_AFTER_MONTHS: i64 = 4;

/// Visits in the trailing year that make a patient `Frecuente`.
pub const FREQUENT_VISITS_PER_YEAR: usize = 5;

/// Map a past-visit history to an engagement state. First matching rule wins.
pub fn classify_status(past_visits: &[DateTime<Utc>], now: DateTime<FixedOffset>) -> PatientStatus {
    let Some(last_visit) = past_visits.iter().max() else {
        return PatientStatus::Nuevo;
    };

    let months_since = calendar_months_between(*last_visit, now);
    if months_since >= INACTIVE_AFTER_MONTHS {
        return PatientStatus::Inactivo;
    }
    if months_since >= AT_RISK_AFTER_MONTHS {
        return PatientStatus::EnRiesgo;
    }
    if past_visits.len() == 1 {
        return PatientStatus::Nuevo;
    }

    let year_ago = months_before(now, 12);
    let recent = past_visits.iter().filter(|v| **v >= year_ago).count();
    if recent >= FREQUENT_VISITS_PER_YEAR {
        PatientStatus::Frecuente
    } else {
        PatientStatus::Activo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::west_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 15, 12, 0, 0)
            .unwrap()
    }

    fn months_ago(months: u32) -> DateTime<Utc> {
        months_before(now(), months)
    }

    #[test]
    fn test_no_past_visits_is_nuevo() {
        assert_eq!(classify_status(&[], now()), PatientStatus::Nuevo);
    }

    #[test]
    fn test_single_recent_visit_is_nuevo() {
        let visits = vec![months_ago(1)];
        assert_eq!(classify_status(&visits, now()), PatientStatus::Nuevo);
    }

    #[test]
    fn test_ten_months_is_inactivo_regardless_of_count() {
        let visits: Vec<_> = (10..=20).rev().map(months_ago).collect();
        assert_eq!(classify_status(&visits, now()), PatientStatus::Inactivo);

        let only = vec![months_ago(10)];
        assert_eq!(classify_status(&only, now()), PatientStatus::Inactivo);
    }

    #[test]
    fn test_thresholds_are_calendar_months() {
        // Exactly nine calendar months back
        assert_eq!(classify_status(&[months_ago(9)], now()), PatientStatus::Inactivo);
        assert_eq!(classify_status(&[months_ago(8)], now()), PatientStatus::EnRiesgo);
        assert_eq!(classify_status(&[months_ago(4)], now()), PatientStatus::EnRiesgo);
        assert_eq!(classify_status(&[months_ago(3)], now()), PatientStatus::Nuevo);
    }

    #[test]
    fn test_at_risk_beats_single_visit_rule() {
        let visits = vec![months_ago(5)];
        assert_eq!(classify_status(&visits, now()), PatientStatus::EnRiesgo);
    }

    #[test]
    fn test_six_visits_within_eleven_months_is_frecuente() {
        let mut visits: Vec<_> = [11, 9, 7, 5, 3, 1].into_iter().map(months_ago).collect();
        visits.sort();
        assert_eq!(classify_status(&visits, now()), PatientStatus::Frecuente);
    }

    #[test]
    fn test_old_visits_do_not_count_towards_frecuente() {
        let mut visits: Vec<_> = [20, 18, 16, 2, 1].into_iter().map(months_ago).collect();
        visits.sort();
        assert_eq!(classify_status(&visits, now()), PatientStatus::Activo);
    }

    #[test]
    fn test_two_recent_visits_is_activo() {
        let now_utc = now().with_timezone(&Utc);
        let visits = vec![now_utc - Duration::days(40), now_utc - Duration::days(2)];
        assert_eq!(classify_status(&visits, now()), PatientStatus::Activo);
    }
}
