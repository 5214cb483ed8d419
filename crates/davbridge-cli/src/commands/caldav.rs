//! Calendar commands: `calendars`, `events` and `create`.
//!
//! Each command runs one operation against the server and prints its result
//! as pretty JSON on stdout.

use serde::Serialize;
use tracing::info;

use davbridge_caldav::{CalDavService, Connector};
use davbridge_core::{Credentials, NewEventSpec, parse_instant};

use crate::cli::CreateArgs;
use crate::error::{ClientError, ClientResult};

/// Lists calendars.
pub async fn calendars<C: Connector>(
    service: &CalDavService<C>,
    credentials: &Credentials,
) -> ClientResult<String> {
    let calendars = service.list_calendars(credentials).await?;
    info!(count = calendars.len(), "Listed calendars");
    to_json(&calendars)
}

/// Lists the events of a calendar within a window.
pub async fn events<C: Connector>(
    service: &CalDavService<C>,
    credentials: &Credentials,
    calendar: &str,
    start: &str,
    end: &str,
) -> ClientResult<String> {
    let events = service
        .list_events(credentials, calendar, start, end)
        .await?;
    info!(calendar = %calendar, count = events.len(), "Listed events");
    to_json(&events)
}

/// Creates an event.
pub async fn create<C: Connector>(
    service: &CalDavService<C>,
    credentials: &Credentials,
    args: &CreateArgs,
) -> ClientResult<String> {
    let spec = new_event_spec(args)?;
    let created = service.create_event(credentials, &spec).await?;
    info!(url = %created.url, "Created event");
    to_json(&created)
}

/// Builds the creation request from command arguments.
pub fn new_event_spec(args: &CreateArgs) -> ClientResult<NewEventSpec> {
    let start = parse_instant(&args.start)
        .map_err(|e| ClientError::InvalidInput(format!("--start: {}", e)))?;
    let end = parse_instant(&args.end)
        .map_err(|e| ClientError::InvalidInput(format!("--end: {}", e)))?;

    let mut spec = NewEventSpec::new(&args.calendar, &args.summary, start, end);
    if let Some(ref description) = args.description {
        spec = spec.with_description(description);
    }
    if let Some(ref location) = args.location {
        spec = spec.with_location(location);
    }
    Ok(spec)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> ClientResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
