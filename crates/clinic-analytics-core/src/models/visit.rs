//! Visit records parsed from calendar titles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One parsed (name, phone, timestamp) tuple derived from a calendar event.
///
/// Ephemeral: produced by the harvest stage and discarded after resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitRecord {
    /// Name exactly as typed in the title (trimmed)
    pub raw_name: String,
    /// Phone exactly as typed in the title (trimmed)
    pub raw_phone: String,
    /// Event start instant
    pub visit_timestamp: DateTime<Utc>,
    /// Whether the visit is after the harvest instant
    pub is_future: bool,
    /// Owner of the calendar the event came from
    pub practitioner: String,
    /// Position in harvest order (source order, then event order)
    pub sequence: u64,
}

impl VisitRecord {
    /// Create a record, deriving `is_future` from `now`.
    pub fn new(
        raw_name: impl Into<String>,
        raw_phone: impl Into<String>,
        visit_timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
        practitioner: impl Into<String>,
    ) -> Self {
        Self {
            raw_name: raw_name.into(),
            raw_phone: raw_phone.into(),
            visit_timestamp,
            is_future: visit_timestamp > now,
            practitioner: practitioner.into(),
            sequence: 0,
        }
    }

    /// Set the harvest sequence number.
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_is_future_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();

        let at_now = VisitRecord::new("Ana", "1", now, now, "Dr. A");
        let later = VisitRecord::new("Ana", "1", now + Duration::minutes(1), now, "Dr. A");

        // A visit starting exactly now counts as past
        assert!(!at_now.is_future);
        assert!(later.is_future);
    }
}
