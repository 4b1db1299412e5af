//! Calendar-service boundary for clinic analytics.
//!
//! Each practitioner keeps their own calendar. A [`CalendarSource`] lists the
//! events of one practitioner inside a bounded [`TimeWindow`]; the analytics
//! core only ever reads titles and start instants.

pub mod event;
pub mod export;
#[cfg(feature = "http")]
pub mod google;

pub use event::*;
pub use export::*;
#[cfg(feature = "http")]
pub use google::GoogleCalendarSource;
