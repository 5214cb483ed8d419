//! Calendar enumeration and lookup by display name.

use tracing::{debug, info};
use url::Url;

use davbridge_core::{Calendar, redact_url};

use crate::error::{DavError, DavResult};
use crate::session::Session;
use crate::xml::{DiscoveredCalendar, parse_propfind_response, propfind_calendars_body};

/// Lists the calendars in the session's calendar home, in server order.
///
/// Only collections whose resource type is `calendar` are returned. An
/// empty home yields an empty list.
pub async fn list_calendars(session: &Session) -> DavResult<Vec<Calendar>> {
    let home = session.calendar_home_url();
    let body = propfind_calendars_body()
        .map_err(|e| DavError::encode("failed to build request body").with_source(e))?;

    debug!(home = %redact_url(home), "Listing calendars via PROPFIND");
    let response = session.propfind(home, body, 1).await?;

    let discovered = parse_propfind_response(&response.body).map_err(|e| {
        DavError::network("malformed multistatus response")
            .with_resource(redact_url(&response.url))
            .with_source(e)
    })?;

    let calendars = discovered
        .into_iter()
        .map(|c| to_calendar(&response.url, c))
        .collect::<DavResult<Vec<_>>>()?;

    info!(count = calendars.len(), "Discovered calendars");
    Ok(calendars)
}

/// Finds the calendar with the given display name.
///
/// When several calendars share the name, the first in server order wins.
///
/// # Errors
///
/// Returns a `NotFound` error naming the calendar if none matches.
pub async fn resolve_by_name(session: &Session, name: &str) -> DavResult<Calendar> {
    let calendars = list_calendars(session).await?;
    find_by_name(calendars, name)
}

/// Picks the first calendar whose display name equals `name` exactly.
pub fn find_by_name(calendars: Vec<Calendar>, name: &str) -> DavResult<Calendar> {
    let mut matching = calendars.into_iter().filter(|c| c.display_name == name);
    let found = matching
        .next()
        .ok_or_else(|| DavError::not_found("calendar not found").with_calendar(name))?;

    let duplicates = matching.count();
    if duplicates > 0 {
        debug!(
            calendar = %name,
            duplicates,
            "Several calendars share this name, using the first"
        );
    }
    Ok(found)
}

fn to_calendar(base: &Url, discovered: DiscoveredCalendar) -> DavResult<Calendar> {
    let url = base.join(&discovered.href).map_err(|e| {
        DavError::network(format!("invalid calendar href `{}`", discovered.href))
            .with_resource(redact_url(base))
            .with_source(e)
    })?;
    let display_name = discovered
        .display_name
        .unwrap_or_else(|| last_segment(&url));

    let mut calendar =
        Calendar::new(url.to_string(), display_name).with_supported_components(discovered.components);
    calendar.description = discovered.description;
    calendar.color = discovered.color;
    calendar.ctag = discovered.ctag;
    Ok(calendar)
}

/// Decoded last non-empty path segment, e.g. `work` for `/calendars/alice/work/`.
fn last_segment(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .unwrap_or_default();
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}
