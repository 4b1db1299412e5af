//! Status classification, KPI computation and chart bucketing.
//!
//! Every function takes the computation instant explicitly. The offset of
//! `now` is the clinic's calendar zone: month and day boundaries are taken in
//! that offset.

mod chart;
mod kpi;
mod status;

pub use chart::*;
pub use kpi::*;
pub use status::*;

use chrono::{DateTime, Datelike, Duration, FixedOffset, Months, Utc};

use crate::models::{AnalyticsSnapshot, ResolvedPatient};

/// KPIs, patient directory and chart for resolved patients as of `now`.
pub fn analyze(patients: &[ResolvedPatient], now: DateTime<FixedOffset>) -> AnalyticsSnapshot {
    AnalyticsSnapshot {
        kpis: compute_kpis(patients, now),
        patients: patients.iter().map(|p| p.patient.clone()).collect(),
        monthly_buckets: bucketize(patients, now),
    }
}

/// Month number since year 0, for whole-calendar-month arithmetic.
fn month_index<D: Datelike>(date: &D) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

/// Whole calendar months between `earlier` and `now`, ignoring day of month.
///
/// March 31 → April 1 is one month; March 1 → March 31 is zero.
pub fn calendar_months_between(earlier: DateTime<Utc>, now: DateTime<FixedOffset>) -> i64 {
    let local = earlier.with_timezone(now.offset());
    month_index(&now) - month_index(&local)
}

/// The instant `months` calendar months before `now`.
pub fn months_before(now: DateTime<FixedOffset>, months: u32) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(months))
        .unwrap_or_else(|| now - Duration::days(30 * i64::from(months)))
        .with_timezone(&Utc)
}

/// Check whether `instant` falls in the same calendar month as `now`.
pub fn in_same_month(instant: DateTime<Utc>, now: DateTime<FixedOffset>) -> bool {
    calendar_months_between(instant, now) == 0
}

/// Check whether two instants share a calendar day in `zone`.
pub fn same_local_day(a: DateTime<Utc>, b: DateTime<Utc>, zone: &FixedOffset) -> bool {
    a.with_timezone(zone).date_naive() == b.with_timezone(zone).date_naive()
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
