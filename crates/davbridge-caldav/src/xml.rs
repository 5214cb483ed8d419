//! XML utilities for CalDAV WebDAV operations.
//!
//! This module handles generating the PROPFIND and REPORT request bodies and
//! parsing the multistatus responses they produce.

use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use std::io::Cursor;

use davbridge_core::TimeWindow;

/// DAV namespace
pub const DAV_NS: &str = "DAV:";
/// CalDAV namespace
pub const CALDAV_NS: &str = "urn:ietf:params:xml:ns:caldav";
/// CalendarServer namespace (for Apple servers)
pub const CS_NS: &str = "http://calendarserver.org/ns/";
/// Apple iCal namespace (calendar-color)
pub const ICAL_NS: &str = "http://apple.com/ns/ical/";

type XmlResult<T> = Result<T, quick_xml::Error>;

/// A calendar collection found in a PROPFIND response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredCalendar {
    /// The calendar's href as returned by the server.
    pub href: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    /// The ctag (for change detection).
    pub ctag: Option<String>,
    /// Names from `supported-calendar-component-set`.
    pub components: Vec<String>,
}

/// One `<response>` of a calendar-query REPORT that carried calendar data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub href: String,
    pub etag: Option<String>,
    pub calendar_data: String,
}

/// PROPFIND body asking for the authenticated user's principal.
pub fn propfind_principal_body() -> XmlResult<String> {
    propfind_body(&[], &["d:current-user-principal"])
}

/// PROPFIND body asking a principal for its calendar home.
pub fn propfind_home_body() -> XmlResult<String> {
    propfind_body(&[("xmlns:c", CALDAV_NS)], &["c:calendar-home-set"])
}

/// PROPFIND body for enumerating calendars under a calendar home.
pub fn propfind_calendars_body() -> XmlResult<String> {
    propfind_body(
        &[("xmlns:c", CALDAV_NS), ("xmlns:cs", CS_NS), ("xmlns:ic", ICAL_NS)],
        &[
            "d:displayname",
            "d:resourcetype",
            "c:supported-calendar-component-set",
            "c:calendar-description",
            "cs:getctag",
            "ic:calendar-color",
        ],
    )
}

fn propfind_body(namespaces: &[(&str, &str)], props: &[&str]) -> XmlResult<String> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut propfind = BytesStart::new("d:propfind");
    propfind.push_attribute(("xmlns:d", DAV_NS));
    for ns in namespaces {
        propfind.push_attribute(*ns);
    }
    writer.write_event(Event::Start(propfind))?;
    writer.write_event(Event::Start(BytesStart::new("d:prop")))?;
    for prop in props {
        writer.write_event(Event::Empty(BytesStart::new(*prop)))?;
    }
    writer.write_event(Event::End(BytesEnd::new("d:prop")))?;
    writer.write_event(Event::End(BytesEnd::new("d:propfind")))?;

    Ok(into_string(writer))
}

/// Generates a calendar-query REPORT body for events overlapping `window`.
///
/// The `expand` element asks the server to materialize each occurrence of a
/// recurring event inside the window as its own VEVENT.
pub fn calendar_query_body(window: &TimeWindow) -> XmlResult<String> {
    let (start, end) = window.to_ical_range();
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut query = BytesStart::new("c:calendar-query");
    query.push_attribute(("xmlns:d", DAV_NS));
    query.push_attribute(("xmlns:c", CALDAV_NS));
    writer.write_event(Event::Start(query))?;

    // <d:prop><d:getetag/><c:calendar-data><c:expand/></c:calendar-data></d:prop>
    writer.write_event(Event::Start(BytesStart::new("d:prop")))?;
    writer.write_event(Event::Empty(BytesStart::new("d:getetag")))?;
    writer.write_event(Event::Start(BytesStart::new("c:calendar-data")))?;
    let mut expand = BytesStart::new("c:expand");
    expand.push_attribute(("start", start.as_str()));
    expand.push_attribute(("end", end.as_str()));
    writer.write_event(Event::Empty(expand))?;
    writer.write_event(Event::End(BytesEnd::new("c:calendar-data")))?;
    writer.write_event(Event::End(BytesEnd::new("d:prop")))?;

    // <c:filter> VCALENDAR > VEVENT > time-range
    writer.write_event(Event::Start(BytesStart::new("c:filter")))?;
    let mut vcal_filter = BytesStart::new("c:comp-filter");
    vcal_filter.push_attribute(("name", "VCALENDAR"));
    writer.write_event(Event::Start(vcal_filter))?;
    let mut vevent_filter = BytesStart::new("c:comp-filter");
    vevent_filter.push_attribute(("name", "VEVENT"));
    writer.write_event(Event::Start(vevent_filter))?;
    let mut time_range = BytesStart::new("c:time-range");
    time_range.push_attribute(("start", start.as_str()));
    time_range.push_attribute(("end", end.as_str()));
    writer.write_event(Event::Empty(time_range))?;
    writer.write_event(Event::End(BytesEnd::new("c:comp-filter")))?;
    writer.write_event(Event::End(BytesEnd::new("c:comp-filter")))?;
    writer.write_event(Event::End(BytesEnd::new("c:filter")))?;

    writer.write_event(Event::End(BytesEnd::new("c:calendar-query")))?;

    Ok(into_string(writer))
}

fn into_string(writer: Writer<Cursor<Vec<u8>>>) -> String {
    String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned()
}

/// Finds the first `<href>` nested inside the property named `property`.
///
/// Used for `current-user-principal` and `calendar-home-set`.
pub fn parse_href_property(xml: &str, property: &str) -> XmlResult<Option<String>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut inside_property = 0usize;
    let mut in_href = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match local_name(&name) {
                    local if local == property => inside_property += 1,
                    "href" if inside_property > 0 => in_href = true,
                    _ => {}
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match local_name(&name) {
                    local if local == property => {
                        inside_property = inside_property.saturating_sub(1)
                    }
                    "href" => in_href = false,
                    _ => {}
                }
            }
            Event::Text(e) if in_href => {
                let text = e.unescape()?.trim().to_string();
                if !text.is_empty() {
                    return Ok(Some(text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(None)
}

/// Parses a PROPFIND response to extract calendar collections.
///
/// Only responses whose `resourcetype` contains `calendar` are returned,
/// in document order.
pub fn parse_propfind_response(xml: &str) -> XmlResult<Vec<DiscoveredCalendar>> {
    let mut calendars = Vec::new();

    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut current = DiscoveredCalendar::default();
    let mut is_calendar = false;
    let mut in_resourcetype = false;
    let mut in_component_set = false;
    let mut current_element: Option<String> = None;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match local_name(&name) {
                    "response" => {
                        current = DiscoveredCalendar::default();
                        is_calendar = false;
                    }
                    "resourcetype" => in_resourcetype = true,
                    "supported-calendar-component-set" => in_component_set = true,
                    "calendar" if in_resourcetype => is_calendar = true,
                    "comp" if in_component_set => {
                        if let Some(component) = comp_name(&e)? {
                            current.components.push(component);
                        }
                    }
                    local @ ("href" | "displayname" | "calendar-description" | "getctag"
                    | "calendar-color") => {
                        current_element = Some(local.to_string());
                        text.clear();
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match local_name(&name) {
                    "calendar" if in_resourcetype => is_calendar = true,
                    "comp" if in_component_set => {
                        if let Some(component) = comp_name(&e)? {
                            current.components.push(component);
                        }
                    }
                    _ => {}
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match local_name(&name) {
                    "response" => {
                        if is_calendar && !current.href.is_empty() {
                            calendars.push(std::mem::take(&mut current));
                        }
                    }
                    "resourcetype" => in_resourcetype = false,
                    "supported-calendar-component-set" => in_component_set = false,
                    local if current_element.as_deref() == Some(local) => {
                        let value = std::mem::take(&mut text);
                        match local {
                            "href" => current.href = value,
                            "displayname" => current.display_name = non_empty(value),
                            "calendar-description" => current.description = non_empty(value),
                            "getctag" => current.ctag = non_empty(value),
                            "calendar-color" => current.color = non_empty(value),
                            _ => {}
                        }
                        current_element = None;
                    }
                    _ => {}
                }
            }
            Event::Text(e) if current_element.is_some() => {
                text.push_str(&e.unescape()?);
            }
            Event::CData(e) if current_element.is_some() => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(calendars)
}

/// Parses a calendar-query REPORT response.
///
/// Responses without calendar data (e.g. a 404 propstat) are skipped.
/// ETags are kept verbatim, quotes included.
pub fn parse_report_response(xml: &str) -> XmlResult<Vec<ReportEntry>> {
    let mut results = Vec::new();

    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut href: Option<String> = None;
    let mut etag: Option<String> = None;
    let mut data: Option<String> = None;
    let mut current_element: Option<String> = None;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match local_name(&name) {
                    "response" => {
                        href = None;
                        etag = None;
                        data = None;
                    }
                    local @ ("href" | "getetag" | "calendar-data") => {
                        current_element = Some(local.to_string());
                        text.clear();
                    }
                    _ => {}
                }
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                match local_name(&name) {
                    "response" => {
                        if let (Some(href), Some(data)) = (href.take(), data.take()) {
                            results.push(ReportEntry {
                                href,
                                etag: etag.take(),
                                calendar_data: data,
                            });
                        }
                    }
                    local if current_element.as_deref() == Some(local) => {
                        let value = std::mem::take(&mut text);
                        match local {
                            "href" => href = Some(value),
                            "getetag" => etag = non_empty(value),
                            "calendar-data" => data = non_empty(value),
                            _ => {}
                        }
                        current_element = None;
                    }
                    _ => {}
                }
            }
            Event::Text(e) if current_element.is_some() => {
                text.push_str(&e.unescape()?);
            }
            Event::CData(e) if current_element.is_some() => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(results)
}

/// Reads the `name` attribute of a `<C:comp>` element.
fn comp_name(element: &BytesStart<'_>) -> XmlResult<Option<String>> {
    match element.try_get_attribute("name")? {
        Some(attr) => Ok(Some(attr.unescape_value()?.to_string())),
        None => Ok(None),
    }
}

/// Extracts the local name from a potentially namespaced element name.
fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn propfind_bodies() {
        let body = propfind_principal_body().unwrap();
        assert!(body.contains("<d:current-user-principal/>"));

        let body = propfind_home_body().unwrap();
        assert!(body.contains("<c:calendar-home-set/>"));
        assert!(body.contains(CALDAV_NS));

        let body = propfind_calendars_body().unwrap();
        assert!(body.contains("displayname"));
        assert!(body.contains("resourcetype"));
        assert!(body.contains("supported-calendar-component-set"));
        assert!(body.contains("getctag"));
    }

    #[test]
    fn calendar_query_body_generation() {
        let window = TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap(),
        )
        .unwrap();

        let body = calendar_query_body(&window).unwrap();

        assert!(body.contains("calendar-query"));
        assert!(body.contains(
            r#"<c:time-range start="20250101T000000Z" end="20250102T000000Z"/>"#
        ));
        assert!(body.contains(r#"<c:expand start="20250101T000000Z" end="20250102T000000Z"/>"#));
        assert!(body.contains(r#"<c:comp-filter name="VCALENDAR">"#));
        assert!(body.contains(r#"<c:comp-filter name="VEVENT">"#));
    }

    #[test]
    fn principal_href() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/</d:href>
    <d:propstat>
      <d:prop>
        <d:current-user-principal>
          <d:href>/principals/users/alice/</d:href>
        </d:current-user-principal>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;

        assert_eq!(
            parse_href_property(xml, "current-user-principal").unwrap(),
            Some("/principals/users/alice/".to_string())
        );
        assert_eq!(parse_href_property(xml, "calendar-home-set").unwrap(), None);
    }

    #[test]
    fn principal_href_missing_when_unauthenticated_prop() {
        let xml = r#"<multistatus xmlns="DAV:">
  <response>
    <href>/</href>
    <propstat>
      <prop><current-user-principal/></prop>
      <status>HTTP/1.1 404 Not Found</status>
    </propstat>
  </response>
</multistatus>"#;

        assert_eq!(parse_href_property(xml, "current-user-principal").unwrap(), None);
    }

    #[test]
    fn parse_propfind_calendars() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<multistatus xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav" xmlns:CS="http://calendarserver.org/ns/">
  <response>
    <href>/calendars/alice/</href>
    <propstat>
      <prop>
        <resourcetype><collection/></resourcetype>
      </prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
  <response>
    <href>/calendars/alice/work/</href>
    <propstat>
      <prop>
        <displayname>Work</displayname>
        <resourcetype>
          <collection/>
          <C:calendar/>
        </resourcetype>
        <C:supported-calendar-component-set>
          <C:comp name="VEVENT"/>
          <C:comp name="VTODO"/>
        </C:supported-calendar-component-set>
        <CS:getctag>ctag-1</CS:getctag>
      </prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
    <propstat>
      <prop>
        <C:calendar-description/>
      </prop>
      <status>HTTP/1.1 404 Not Found</status>
    </propstat>
  </response>
  <response>
    <href>/calendars/alice/inbox/</href>
    <propstat>
      <prop>
        <displayname>Inbox</displayname>
        <resourcetype><collection/><C:schedule-inbox/></resourcetype>
      </prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
</multistatus>"#;

        let calendars = parse_propfind_response(xml).unwrap();

        assert_eq!(calendars.len(), 1);
        let work = &calendars[0];
        assert_eq!(work.href, "/calendars/alice/work/");
        assert_eq!(work.display_name.as_deref(), Some("Work"));
        assert_eq!(work.components, vec!["VEVENT", "VTODO"]);
        assert_eq!(work.ctag.as_deref(), Some("ctag-1"));
        assert!(work.description.is_none());
    }

    #[test]
    fn parse_propfind_escaped_display_name() {
        let xml = r#"<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/cal/rd/</d:href>
    <d:propstat><d:prop>
      <d:displayname>R&amp;D</d:displayname>
      <d:resourcetype><d:collection/><c:calendar/></d:resourcetype>
    </d:prop></d:propstat>
  </d:response>
</d:multistatus>"#;

        let calendars = parse_propfind_response(xml).unwrap();
        assert_eq!(calendars[0].display_name.as_deref(), Some("R&D"));
    }

    #[test]
    fn parse_report_events() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<multistatus xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <response>
    <href>/calendars/user/work/event1.ics</href>
    <propstat>
      <prop>
        <getetag>"abc123"</getetag>
        <C:calendar-data>BEGIN:VCALENDAR
VERSION:2.0
BEGIN:VEVENT
UID:event1@example.com
DTSTART:20250205T100000Z
DTEND:20250205T110000Z
SUMMARY:Team Meeting
END:VEVENT
END:VCALENDAR</C:calendar-data>
      </prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
  <response>
    <href>/calendars/user/work/gone.ics</href>
    <propstat>
      <prop><getetag/><C:calendar-data/></prop>
      <status>HTTP/1.1 404 Not Found</status>
    </propstat>
  </response>
</multistatus>"#;

        let results = parse_report_response(xml).unwrap();

        assert_eq!(results.len(), 1);
        let entry = &results[0];
        assert_eq!(entry.href, "/calendars/user/work/event1.ics");
        assert_eq!(entry.etag.as_deref(), Some("\"abc123\""));
        assert!(entry.calendar_data.contains("SUMMARY:Team Meeting"));
    }

    #[test]
    fn parse_report_cdata() {
        let xml = r#"<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/cal/a.ics</d:href>
    <d:propstat><d:prop>
      <c:calendar-data><![CDATA[BEGIN:VCALENDAR
END:VCALENDAR]]></c:calendar-data>
    </d:prop></d:propstat>
  </d:response>
</d:multistatus>"#;

        let results = parse_report_response(xml).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].etag.is_none());
        assert!(results[0].calendar_data.starts_with("BEGIN:VCALENDAR"));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(parse_report_response("<multistatus><response></multistatus>").is_err());
    }

    #[test]
    fn empty_multistatus() {
        let xml = r#"<d:multistatus xmlns:d="DAV:"/>"#;
        assert!(parse_report_response(xml).unwrap().is_empty());
        assert!(parse_propfind_response(xml).unwrap().is_empty());
    }
}
