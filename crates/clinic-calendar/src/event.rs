//! Calendar event types and the source trait.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Calendar source errors.
#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid event format: {0}")]
    InvalidFormat(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),
}

pub type CalendarResult<T> = Result<T, CalendarError>;

/// When an event starts. All-day events only carry a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStart {
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

impl EventStart {
    /// Resolve to an instant. All-day events start at local midnight in `zone`.
    pub fn to_utc(&self, zone: &FixedOffset) -> DateTime<Utc> {
        match self {
            EventStart::DateTime(dt) => dt.with_timezone(&Utc),
            EventStart::Date(date) => {
                let midnight = date.and_time(NaiveTime::default());
                let utc = midnight - Duration::seconds(i64::from(zone.local_minus_utc()));
                Utc.from_utc_datetime(&utc)
            }
        }
    }
}

/// A single calendar event as exposed by the calendar service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Free-text title, hand-edited by staff
    pub title: String,
    /// Start instant or date
    pub start: EventStart,
}

impl CalendarEvent {
    pub fn new(title: impl Into<String>, start: EventStart) -> Self {
        Self {
            title: title.into(),
            start,
        }
    }

    /// Convenience constructor for a timed event.
    pub fn at(title: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self::new(title, EventStart::DateTime(start.fixed_offset()))
    }
}

/// Half-open query window `[start, end)`.
///
/// `zone` is the clinic's offset; all-day events are placed at local midnight
/// in it before being compared against the bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub zone: FixedOffset,
}

impl TimeWindow {
    /// Window in UTC. Use [`TimeWindow::with_zone`] for a clinic-local one.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            zone: Utc.fix(),
        }
    }

    pub fn with_zone(mut self, zone: FixedOffset) -> Self {
        self.zone = zone;
        self
    }

    /// Check whether an instant falls inside the window.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Check whether an event start falls inside the window.
    pub fn contains_start(&self, start: &EventStart) -> bool {
        self.contains(start.to_utc(&self.zone))
    }
}

/// Read-only access to one practitioner's calendar.
///
/// Implementations are blocking; callers that need concurrency run them on a
/// blocking pool.
pub trait CalendarSource: Send + Sync {
    /// Display name of the practitioner owning this calendar.
    fn practitioner(&self) -> &str;

    /// List events starting inside `window`.
    fn list_events(&self, window: &TimeWindow) -> CalendarResult<Vec<CalendarEvent>>;
}
