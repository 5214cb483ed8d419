//! Time-range event queries.

use tracing::{debug, info};
use url::Url;

use davbridge_core::{Calendar, CalendarObject, EventRecord, TimeWindow, redact_url};

use crate::error::{DavError, DavResult};
use crate::ics;
use crate::session::Session;
use crate::xml::{calendar_query_body, parse_report_response};

/// Fetches the events of `calendar` overlapping `window`, sorted by start.
///
/// Recurring events are expanded server-side, so each occurrence in the
/// window comes back as its own record. Events without a start sort last.
///
/// # Errors
///
/// Returns a `Decode` error naming the offending resource when a returned
/// object cannot be decoded.
pub async fn query_events(
    session: &Session,
    calendar: &Calendar,
    window: &TimeWindow,
) -> DavResult<Vec<EventRecord>> {
    let objects = fetch_objects(session, calendar, window).await?;

    let mut events = Vec::new();
    for object in objects {
        let decoded = ics::decode(&object.data).map_err(|e| {
            e.with_calendar(calendar.display_name.clone())
                .with_resource(object.url.clone())
        })?;
        events.extend(
            decoded
                .into_iter()
                .map(|event| event.into_record(object.url.clone(), object.etag.clone())),
        );
    }

    sort_by_start(&mut events);

    info!(
        calendar = %calendar.display_name,
        count = events.len(),
        "Fetched and decoded events"
    );
    Ok(events)
}

/// Runs the calendar-query REPORT and returns the raw objects.
pub async fn fetch_objects(
    session: &Session,
    calendar: &Calendar,
    window: &TimeWindow,
) -> DavResult<Vec<CalendarObject>> {
    let calendar_url = Url::parse(&calendar.url).map_err(|e| {
        DavError::network(format!("invalid calendar URL `{}`", calendar.url))
            .with_calendar(calendar.display_name.clone())
            .with_source(e)
    })?;
    let body = calendar_query_body(window)
        .map_err(|e| DavError::encode("failed to build request body").with_source(e))?;

    debug!(
        calendar = %redact_url(&calendar_url),
        start = %window.start,
        end = %window.end,
        "Fetching events with REPORT"
    );

    let response = session.report(&calendar_url, body).await?;
    let entries = parse_report_response(&response.body).map_err(|e| {
        DavError::network("malformed multistatus response")
            .with_resource(redact_url(&response.url))
            .with_source(e)
    })?;

    debug!(count = entries.len(), "Received calendar objects");

    entries
        .into_iter()
        .map(|entry| {
            let url = response.url.join(&entry.href).map_err(|e| {
                DavError::network(format!("invalid object href `{}`", entry.href))
                    .with_resource(redact_url(&response.url))
                    .with_source(e)
            })?;
            Ok(CalendarObject {
                url: url.to_string(),
                etag: entry.etag,
                data: entry.calendar_data,
            })
        })
        .collect()
}

/// Stable sort by start time; records without a start go last.
pub fn sort_by_start(events: &mut [EventRecord]) {
    events.sort_by_key(|event| (event.start.is_none(), event.start));
}
