//! Calendar events export parsing and offline sources.
//!
//! The export format is the calendar service's `events.list` response body:
//!
//! ```json
//! {"items": [{"summary": "N:Ana T:1122334455", "start": {"dateTime": "2024-05-01T10:00:00-03:00"}}]}
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::event::{CalendarError, CalendarEvent, CalendarResult, CalendarSource, EventStart, TimeWindow};

/// Raw events page from the calendar service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsPage {
    #[serde(default)]
    pub items: Vec<RawEvent>,
    pub next_page_token: Option<String>,
}

/// A raw event as the calendar service returns it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    pub summary: Option<String>,
    pub status: Option<String>,
    pub start: Option<RawEventStart>,
}

/// Raw start field: exactly one of `date` / `dateTime` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEventStart {
    pub date: Option<String>,
    pub date_time: Option<String>,
}

impl RawEvent {
    /// Convert to a [`CalendarEvent`]. Cancelled and start-less events yield `None`.
    pub fn into_event(self) -> CalendarResult<Option<CalendarEvent>> {
        if self.status.as_deref() == Some("cancelled") {
            return Ok(None);
        }
        let Some(start) = self.start else {
            return Ok(None);
        };

        let start = match (start.date_time, start.date) {
            (Some(dt), _) => EventStart::DateTime(parse_date_time(&dt)?),
            (None, Some(date)) => EventStart::Date(parse_date(&date)?),
            (None, None) => return Ok(None),
        };

        Ok(Some(CalendarEvent {
            title: self.summary.unwrap_or_default(),
            start,
        }))
    }
}

fn parse_date_time(raw: &str) -> CalendarResult<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw)
        .map_err(|e| CalendarError::InvalidFormat(format!("bad dateTime '{}': {}", raw, e)))
}

fn parse_date(raw: &str) -> CalendarResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| CalendarError::InvalidFormat(format!("bad date '{}': {}", raw, e)))
}

/// Parse one events page into its events and continuation token.
pub fn parse_events_page(json: &str) -> CalendarResult<(Vec<CalendarEvent>, Option<String>)> {
    let page: EventsPage = serde_json::from_str(json)?;

    let mut events = Vec::with_capacity(page.items.len());
    for raw in page.items {
        if let Some(event) = raw.into_event()? {
            events.push(event);
        }
    }

    Ok((events, page.next_page_token))
}

/// Parse an exported events document.
pub fn parse_events_json(json: &str) -> CalendarResult<Vec<CalendarEvent>> {
    parse_events_page(json).map(|(events, _)| events)
}

fn in_window(event: &CalendarEvent, window: &TimeWindow) -> bool {
    window.contains_start(&event.start)
}

/// Source backed by an exported events JSON file.
pub struct JsonExportSource {
    practitioner: String,
    path: PathBuf,
}

impl JsonExportSource {
    pub fn new(practitioner: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            practitioner: practitioner.into(),
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CalendarSource for JsonExportSource {
    fn practitioner(&self) -> &str {
        &self.practitioner
    }

    fn list_events(&self, window: &TimeWindow) -> CalendarResult<Vec<CalendarEvent>> {
        let json = std::fs::read_to_string(&self.path)?;
        let events = parse_events_json(&json)?;
        Ok(events.into_iter().filter(|e| in_window(e, window)).collect())
    }
}

/// In-memory source (for testing and fixtures).
pub struct StaticSource {
    practitioner: String,
    events: Vec<CalendarEvent>,
}

impl StaticSource {
    pub fn new(practitioner: impl Into<String>, events: Vec<CalendarEvent>) -> Self {
        Self {
            practitioner: practitioner.into(),
            events,
        }
    }
}

impl CalendarSource for StaticSource {
    fn practitioner(&self) -> &str {
        &self.practitioner
    }

    fn list_events(&self, window: &TimeWindow) -> CalendarResult<Vec<CalendarEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|e| in_window(e, window))
            .cloned()
            .collect())
    }
}
