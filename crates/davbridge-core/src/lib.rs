//! Core types: credentials, calendars, event records, time windows, tracing

pub mod model;
pub mod time;
pub mod tracing;

pub use model::{
    Calendar, CalendarObject, CalendarObjectRef, Credentials, EventRecord, NewEventSpec,
    PropertyValue, redact_url,
};
pub use time::{TimeError, TimeWindow, format_ical_utc, parse_ical_utc, parse_instant};
pub use tracing::{TracingConfig, TracingError, init_tracing};
