//! Remote calendar source over the calendar service's REST API.

use std::time::Duration;

use chrono::SecondsFormat;

use crate::event::{CalendarError, CalendarEvent, CalendarResult, CalendarSource, TimeWindow};
use crate::export::parse_events_page;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Upper bound on pages followed per fetch.
const MAX_PAGES: usize = 50;

/// Read-only client for one practitioner's remote calendar.
pub struct GoogleCalendarSource {
    practitioner: String,
    calendar_id: String,
    access_token: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::blocking::Client,
}

impl GoogleCalendarSource {
    /// Create a source with a per-request timeout.
    pub fn new(
        practitioner: impl Into<String>,
        calendar_id: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> CalendarResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalendarError::Http(e.to_string()))?;

        Ok(Self {
            practitioner: practitioner.into(),
            calendar_id: calendar_id.into(),
            access_token: access_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout,
            client,
        })
    }

    /// Point the client at a different API root (for testing against a stub server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Events endpoint, with the calendar ID percent-encoded as one path segment.
    fn events_url(&self) -> CalendarResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| CalendarError::Http(format!("bad base URL '{}': {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| CalendarError::Http(format!("base URL '{}' cannot hold a path", self.base_url)))?
            .pop_if_empty()
            .push("calendars")
            .push(&self.calendar_id)
            .push("events");
        Ok(url)
    }

    fn fetch_page(&self, window: &TimeWindow, page_token: Option<&str>) -> CalendarResult<String> {
        let url = self.events_url()?;
        let time_min = window.start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let time_max = window.end.to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut query = vec![
            ("timeMin", time_min.as_str()),
            ("timeMax", time_max.as_str()),
            ("singleEvents", "true"),
            ("maxResults", "2500"),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    CalendarError::Timeout(self.timeout.as_secs())
                } else {
                    CalendarError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CalendarError::Http(format!(
                "{} returned {}",
                self.calendar_id, status
            )));
        }

        response.text().map_err(|e| CalendarError::Http(e.to_string()))
    }
}

impl CalendarSource for GoogleCalendarSource {
    fn practitioner(&self) -> &str {
        &self.practitioner
    }

    fn list_events(&self, window: &TimeWindow) -> CalendarResult<Vec<CalendarEvent>> {
        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let body = self.fetch_page(window, page_token.as_deref())?;
            let (page_events, next) = parse_events_page(&body)?;
            events.extend(page_events);

            match next {
                Some(token) => page_token = Some(token),
                None => return Ok(events),
            }
        }

        Err(CalendarError::InvalidFormat(format!(
            "{} exceeded {} result pages",
            self.calendar_id, MAX_PAGES
        )))
    }
}
