//! Harvest stage: fan out to every practitioner calendar, parse titles.
//!
//! Each source is fetched on the blocking pool under its own timeout. A failed
//! or slow source is recorded and skipped; the pass continues with the rest.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use clinic_calendar::{CalendarEvent, CalendarSource, TimeWindow};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::VisitRecord;
use crate::resolver::{classify_title, TitleMatch};

/// A calendar source that could not be read during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub practitioner: String,
    pub reason: String,
}

/// Counters for one harvest pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestStats {
    /// Events returned by all reachable sources
    pub events_seen: u64,
    /// Events whose title followed the booking grammar
    pub parsed: u64,
    /// Near-conforming titles that were dropped
    pub mismatched: u64,
    /// Titles unrelated to bookings
    pub ignored: u64,
}

/// Everything a harvest pass produced.
#[derive(Debug, Clone, Default)]
pub struct HarvestOutcome {
    pub records: Vec<VisitRecord>,
    pub failures: Vec<SourceFailure>,
    pub stats: HarvestStats,
}

/// Fetch every source concurrently and turn conforming titles into visit records.
///
/// Records are numbered in source order, then event order. The offset of
/// `now` decides where all-day events start.
pub async fn harvest(
    sources: &[Arc<dyn CalendarSource>],
    window: TimeWindow,
    now: DateTime<FixedOffset>,
    timeout: Duration,
) -> HarvestOutcome {
    let fetches = sources.iter().map(|source| fetch_one(Arc::clone(source), window, timeout));
    let results = join_all(fetches).await;

    let mut outcome = HarvestOutcome::default();
    let now_utc = now.with_timezone(&Utc);
    let mut sequence = 0u64;

    for (source, result) in sources.iter().zip(results) {
        let practitioner = source.practitioner();
        let events = match result {
            Ok(events) => events,
            Err(reason) => {
                warn!(practitioner, %reason, "Calendar source unavailable, skipping");
                outcome.failures.push(SourceFailure {
                    practitioner: practitioner.to_string(),
                    reason,
                });
                continue;
            }
        };

        debug!(practitioner, events = events.len(), "Fetched calendar events");
        for event in events {
            outcome.stats.events_seen += 1;
            match classify_title(&event.title) {
                TitleMatch::Visit(parsed) => {
                    let timestamp = event.start.to_utc(now.offset());
                    outcome.records.push(
                        VisitRecord::new(parsed.name, parsed.phone, timestamp, now_utc, practitioner)
                            .with_sequence(sequence),
                    );
                    sequence += 1;
                    outcome.stats.parsed += 1;
                }
                TitleMatch::Mismatch => {
                    warn!(practitioner, title = %event.title, "Title does not follow N:<name>T:<phone>, dropped");
                    outcome.stats.mismatched += 1;
                }
                TitleMatch::Unrelated => outcome.stats.ignored += 1,
            }
        }
    }

    info!(
        sources = sources.len(),
        failed = outcome.failures.len(),
        events = outcome.stats.events_seen,
        parsed = outcome.stats.parsed,
        mismatched = outcome.stats.mismatched,
        "Harvest complete"
    );
    outcome
}

async fn fetch_one(
    source: Arc<dyn CalendarSource>,
    window: TimeWindow,
    timeout: Duration,
) -> Result<Vec<CalendarEvent>, String> {
    let task = tokio::task::spawn_blocking(move || source.list_events(&window));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(events))) => Ok(events),
        Ok(Ok(Err(e))) => Err(e.to_string()),
        Ok(Err(join_error)) => Err(format!("fetch task failed: {}", join_error)),
        Err(_) => Err(format!("timed out after {}s", timeout.as_secs())),
    }
}
