//! Event creation.

use tracing::{debug, info};
use url::Url;

use davbridge_core::{Calendar, CalendarObjectRef, NewEventSpec, redact_url};

use crate::error::{DavError, DavResult};
use crate::ics::{self, EncodedEvent};
use crate::session::Session;

/// Encodes `spec` and stores it as a new object in `calendar`.
///
/// The object is written to `<calendar>/<uid>.ics`. The write is not
/// retried; on a `Network` error check
/// [`DavError::outcome_unknown`] before trying again.
///
/// # Errors
///
/// Returns an `Encode` error before any request when the calendar does not
/// accept events or the new event is invalid.
pub async fn create_event(
    session: &Session,
    calendar: &Calendar,
    spec: &NewEventSpec,
) -> DavResult<CalendarObjectRef> {
    if !calendar.supports("VEVENT") {
        return Err(DavError::encode("calendar does not accept events")
            .with_calendar(calendar.display_name.clone()));
    }

    let encoded = ics::encode(spec)?;
    store(session, calendar, encoded).await
}

/// Stores an already encoded event.
pub async fn store(
    session: &Session,
    calendar: &Calendar,
    encoded: EncodedEvent,
) -> DavResult<CalendarObjectRef> {
    let url = object_url(&calendar.url, &encoded.uid)?;
    debug!(url = %redact_url(&url), uid = %encoded.uid, "Creating event with PUT");

    let response = session
        .put(&url, encoded.ics)
        .await
        .map_err(|e| e.with_calendar(calendar.display_name.clone()))?;

    if !matches!(response.status, 200 | 201 | 204) {
        return Err(DavError::network("unexpected response status")
            .with_status(response.status)
            .with_calendar(calendar.display_name.clone())
            .with_resource(redact_url(&url)));
    }

    info!(calendar = %calendar.display_name, uid = %encoded.uid, "Event created");

    Ok(CalendarObjectRef {
        url: url.to_string(),
        etag: response.etag,
    })
}

/// Builds `<calendar>/<uid>.ics`, percent-encoding the resource name.
pub fn object_url(calendar_url: &str, uid: &str) -> DavResult<Url> {
    let mut base = Url::parse(calendar_url).map_err(|e| {
        DavError::encode(format!("invalid calendar URL `{}`", calendar_url)).with_source(e)
    })?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    let filename = format!("{}.ics", urlencoding::encode(uid));
    base.join(&filename).map_err(|e| {
        DavError::encode(format!("invalid resource name `{}`", filename)).with_source(e)
    })
}
