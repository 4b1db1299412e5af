//! Monthly new/recurring visit buckets for the dashboard chart.

use chrono::{DateTime, Datelike, FixedOffset};

use super::same_local_day;
use crate::models::{MonthlyBucket, ResolvedPatient};

/// Number of calendar months in the chart, ending at the current month.
pub const CHART_MONTHS: u32 = 6;

const MONTH_LABELS: [&str; 12] = [
    "Ene", "Feb", "Mar", "Abr", "May", "Jun", "Jul", "Ago", "Sep", "Oct", "Nov", "Dic",
];

/// Short Spanish label for a month number (1-12).
pub fn month_label(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|i| MONTH_LABELS.get(i as usize))
        .copied()
        .unwrap_or("")
}

/// Bucket past visits into the trailing six calendar months, oldest first.
///
/// A visit is "new" when it lands on the same calendar day as the patient's
/// first visit. Months without visits still get an empty bucket.
pub fn bucketize(patients: &[ResolvedPatient], now: DateTime<FixedOffset>) -> Vec<MonthlyBucket> {
    let zone = *now.offset();
    let mut buckets = trailing_months(now);

    for resolved in patients {
        let first_visit = resolved.patient.first_visit_timestamp;

        for visit in &resolved.past_visits {
            let local = visit.with_timezone(&zone);
            let Some(bucket) = buckets
                .iter_mut()
                .find(|b| b.year == local.year() && b.month == local.month())
            else {
                continue;
            };

            if same_local_day(*visit, first_visit, &zone) {
                bucket.new_patient_count += 1;
            } else {
                bucket.recurring_patient_count += 1;
            }
        }
    }

    buckets
}

fn trailing_months(now: DateTime<FixedOffset>) -> Vec<MonthlyBucket> {
    let current = i64::from(now.year()) * 12 + i64::from(now.month0());

    (0..i64::from(CHART_MONTHS))
        .rev()
        .map(|back| {
            let index = current - back;
            let year = index.div_euclid(12) as i32;
            let month = index.rem_euclid(12) as u32 + 1;
            MonthlyBucket {
                month_label: month_label(month).to_string(),
                year,
                month,
                new_patient_count: 0,
                recurring_patient_count: 0,
            }
        })
        .collect()
}
