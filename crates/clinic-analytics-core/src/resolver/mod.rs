//! Identity resolution for visit records.
//!
//! Pipeline: Title Parsing → Normalization → Grouping by canonical key → Classification

mod normalizer;
mod title;

pub use normalizer::*;
pub use title::*;

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};

use crate::analytics::classify_status;
use crate::models::{PatientAggregate, ResolvedPatient, VisitRecord};

/// Groups flat visit records into one aggregate per patient identity.
///
/// Resolution is commutative: any permutation of the input yields the same
/// aggregates, in canonical-key order.
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    normalizer: Normalizer,
}

impl IdentityResolver {
    /// Create a resolver with the default numbering plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver with a custom normalizer.
    pub fn with_normalizer(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    /// Get the normalizer for direct access.
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Resolve records into patients as of `now`.
    pub fn resolve(&self, records: &[VisitRecord], now: DateTime<FixedOffset>) -> Vec<ResolvedPatient> {
        let mut buckets: BTreeMap<String, Vec<&VisitRecord>> = BTreeMap::new();
        for record in records {
            let key = self
                .normalizer
                .patient_key(&record.raw_name, &record.raw_phone);
            buckets.entry(key).or_default().push(record);
        }

        buckets
            .into_iter()
            .filter_map(|(key, visits)| self.resolve_bucket(key, visits, now))
            .collect()
    }

    fn resolve_bucket(
        &self,
        canonical_key: String,
        mut visits: Vec<&VisitRecord>,
        now: DateTime<FixedOffset>,
    ) -> Option<ResolvedPatient> {
        // Most recent first; the latest spelling of the name wins
        visits.sort_by(|a, b| self.compare_recent_first(a, b));
        let latest = visits.first()?;

        let now_utc = now.with_timezone(&Utc);
        let (future, past): (Vec<&VisitRecord>, Vec<&VisitRecord>) = visits
            .iter()
            .copied()
            .partition(|v| v.visit_timestamp > now_utc);

        let mut past_visits: Vec<DateTime<Utc>> = past.iter().map(|v| v.visit_timestamp).collect();
        past_visits.sort();

        let first_visit_timestamp = visits.iter().map(|v| v.visit_timestamp).min()?;
        let next_future_visit_timestamp = future.iter().map(|v| v.visit_timestamp).min();

        let mut practitioners: Vec<String> = visits.iter().map(|v| v.practitioner.clone()).collect();
        practitioners.sort();
        practitioners.dedup();

        let patient = PatientAggregate {
            display_name: self.normalizer.display_name(&latest.raw_name),
            primary_phone: self.normalizer.normalize_phone(&latest.raw_phone),
            canonical_key,
            total_past_visits: past_visits.len() as u32,
            total_future_visits: future.len() as u32,
            first_visit_timestamp,
            last_visit_timestamp: past_visits.last().copied(),
            next_future_visit_timestamp,
            status: classify_status(&past_visits, now),
            practitioners,
        };

        Some(ResolvedPatient {
            patient,
            past_visits,
        })
    }

    /// Descending by timestamp; ties broken on content, then harvest order.
    fn compare_recent_first(&self, a: &VisitRecord, b: &VisitRecord) -> Ordering {
        b.visit_timestamp
            .cmp(&a.visit_timestamp)
            .then_with(|| {
                self.normalizer
                    .display_name(&a.raw_name)
                    .cmp(&self.normalizer.display_name(&b.raw_name))
            })
            .then_with(|| a.practitioner.cmp(&b.practitioner))
            .then_with(|| a.sequence.cmp(&b.sequence))
    }
}
