//! iCalendar (RFC 5545) codec.
//!
//! Decoding parses calendar objects returned by the server into
//! [`DecodedEvent`]s, one per VEVENT. The VCALENDAR wrapper is only a
//! container and never becomes a record.
//!
//! Encoding builds a VCALENDAR holding exactly one VEVENT from a
//! [`NewEventSpec`] and renders it with `icalendar`, which escapes TEXT
//! values and folds lines at 75 octets. Whatever this module writes it can
//! read back.
//!
//! Limitation: values carrying a `TZID` and floating values are read as UTC
//! wall-clock time.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use icalendar::{
    Calendar, CalendarComponent, CalendarDateTime, Component, DatePerhapsTime, Event, EventLike,
    Property, ValueType,
};
use rand::Rng;
use tracing::debug;

use davbridge_core::{EventRecord, NewEventSpec, PropertyValue, format_ical_utc, parse_ical_utc};

use crate::error::{DavError, DavResult};

/// Product identifier written into every calendar we create.
pub const PRODID: &str = "-//davbridge//CalDAV Client//EN";

/// Domain suffix of generated UIDs.
pub const UID_DOMAIN: &str = "davbridge";

/// Stands in for an escaped backslash (`\\`) while `icalendar` parses.
///
/// The parser unescapes TEXT values with successive replacements, which
/// turns `\\n` into a line break. U+FDD0 is a noncharacter and does not
/// occur in interchanged text.
const ESCAPED_BACKSLASH: char = '\u{FDD0}';

/// Properties mapped to named fields rather than passed through.
const NAMED_PROPERTIES: [&str; 9] = [
    "UID",
    "SUMMARY",
    "DESCRIPTION",
    "LOCATION",
    "DTSTART",
    "DTEND",
    "DTSTAMP",
    "RECURRENCE-ID",
    "STATUS",
];

/// A VEVENT decoded from iCalendar text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedEvent {
    pub uid: Option<String>,
    pub summary: Option<String>,
    /// Empty when the component has no DESCRIPTION.
    pub description: String,
    /// Empty when the component has no LOCATION.
    pub location: String,
    pub start: Option<DateTime<Utc>>,
    /// DTEND, or DTSTART plus DURATION when DTEND is absent.
    pub end: Option<DateTime<Utc>>,
    pub dtstamp: Option<DateTime<Utc>>,
    pub recurrence_id: Option<String>,
    pub status: Option<String>,
    /// Every other property, by name, with its parameters.
    pub properties: BTreeMap<String, Vec<PropertyValue>>,
}

impl DecodedEvent {
    /// Attaches the source object's location and version.
    pub fn into_record(self, url: impl Into<String>, etag: Option<String>) -> EventRecord {
        EventRecord {
            url: url.into(),
            etag,
            uid: self.uid,
            summary: self.summary,
            description: self.description,
            location: self.location,
            start: self.start,
            end: self.end,
            dtstamp: self.dtstamp,
            recurrence_id: self.recurrence_id,
            status: self.status,
            properties: self.properties,
        }
    }
}

/// Decodes iCalendar text into its VEVENTs, in document order.
///
/// Zero VEVENTs is a valid result.
///
/// # Errors
///
/// Returns a `Decode` error when the text is not iCalendar or when a
/// date-time or duration property we read is present but unparseable.
pub fn decode(raw: &str) -> DavResult<Vec<DecodedEvent>> {
    let calendar: Calendar = normalize(raw)
        .parse()
        .map_err(|e| DavError::decode(format!("invalid iCalendar data: {}", e)))?;

    calendar
        .iter()
        .filter_map(|component| match component {
            CalendarComponent::Event(event) => Some(decode_event(event)),
            _ => None,
        })
        .collect()
}

fn decode_event(event: &Event) -> DavResult<DecodedEvent> {
    let start = read_instant(event, "DTSTART", event.get_start())?;
    let end = match read_instant(event, "DTEND", event.get_end())? {
        Some(end) => Some(end),
        None => read_end_from_duration(event, start)?,
    };

    let decoded = DecodedEvent {
        uid: text_value(event, "UID"),
        summary: text_value(event, "SUMMARY"),
        description: text_value(event, "DESCRIPTION").unwrap_or_default(),
        location: text_value(event, "LOCATION").unwrap_or_default(),
        start,
        end,
        dtstamp: read_dtstamp(event)?,
        recurrence_id: text_value(event, "RECURRENCE-ID"),
        status: text_value(event, "STATUS"),
        properties: passthrough(event),
    };

    debug!(
        uid = ?decoded.uid,
        summary = ?decoded.summary,
        start = ?decoded.start,
        "Decoded VEVENT"
    );

    Ok(decoded)
}

fn is_named(name: &str) -> bool {
    NAMED_PROPERTIES
        .iter()
        .any(|named| named.eq_ignore_ascii_case(name))
}

fn text_value(event: &Event, name: &str) -> Option<String> {
    event.properties().get(name).map(property_text)
}

/// Collects every property without a named field, including the ones
/// `icalendar` keeps as multi-properties (ATTENDEE, CATEGORIES, EXDATE...).
fn passthrough(event: &Event) -> BTreeMap<String, Vec<PropertyValue>> {
    let singles = event
        .properties()
        .iter()
        .map(|(name, property)| (name, std::slice::from_ref(property)));
    let multis = event
        .multi_properties()
        .iter()
        .map(|(name, properties)| (name, properties.as_slice()));

    let mut properties: BTreeMap<String, Vec<PropertyValue>> = BTreeMap::new();
    for (name, occurrences) in singles.chain(multis) {
        if is_named(name) {
            continue;
        }
        properties
            .entry(name.clone())
            .or_default()
            .extend(occurrences.iter().map(passthrough_value));
    }
    properties
}

fn passthrough_value(property: &Property) -> PropertyValue {
    PropertyValue {
        value: property_text(property),
        params: property
            .params()
            .values()
            .map(|param| {
                (
                    param.key().to_string(),
                    param.value().replace(ESCAPED_BACKSLASH, "\\\\"),
                )
            })
            .collect(),
    }
}

/// Property value with escaped backslashes put back.
///
/// TEXT values were unescaped by the parser, so the placeholder becomes a
/// single backslash. Other values keep the raw `\\`.
fn property_text(property: &Property) -> String {
    let backslash = match property.value_type() {
        Some(ValueType::Text) => "\\",
        _ => "\\\\",
    };
    property.value().replace(ESCAPED_BACKSLASH, backslash)
}

/// Converts a parsed date-time, failing if the raw property is present but
/// could not be parsed.
fn read_instant(
    event: &Event,
    name: &str,
    parsed: Option<DatePerhapsTime>,
) -> DavResult<Option<DateTime<Utc>>> {
    match (parsed, event.property_value(name)) {
        (Some(value), _) => Ok(Some(to_utc(value))),
        (None, Some(raw)) => Err(DavError::decode(format!(
            "property {} has an invalid date-time value `{}`",
            name, raw
        ))),
        (None, None) => Ok(None),
    }
}

fn read_dtstamp(event: &Event) -> DavResult<Option<DateTime<Utc>>> {
    match event.property_value("DTSTAMP") {
        Some(raw) => parse_ical_utc(raw).map(Some).ok_or_else(|| {
            DavError::decode(format!(
                "property DTSTAMP has an invalid date-time value `{}`",
                raw
            ))
        }),
        None => Ok(None),
    }
}

/// Derives the end of an event that states a DURATION instead of a DTEND.
fn read_end_from_duration(
    event: &Event,
    start: Option<DateTime<Utc>>,
) -> DavResult<Option<DateTime<Utc>>> {
    match (start, event.property_value("DURATION")) {
        (Some(start), Some(raw)) => Ok(Some(start + parse_duration(raw)?)),
        _ => Ok(None),
    }
}

/// Parses an RFC 5545 duration such as `PT1H30M`, `P1D` or `-P1W`.
fn parse_duration(raw: &str) -> DavResult<Duration> {
    let invalid = || {
        DavError::decode(format!(
            "property DURATION has an invalid value `{}`",
            raw
        ))
    };

    let (negative, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let parsed: std::time::Duration = iso8601::duration(unsigned).map_err(|_| invalid())?.into();
    let duration = Duration::from_std(parsed).map_err(|_| invalid())?;

    Ok(if negative { -duration } else { duration })
}

/// Normalizes a parsed date or date-time to a UTC instant.
fn to_utc(value: DatePerhapsTime) -> DateTime<Utc> {
    match value {
        DatePerhapsTime::Date(date) => date.and_time(NaiveTime::MIN).and_utc(),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => dt,
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
            Utc.from_utc_datetime(&naive)
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, .. }) => {
            Utc.from_utc_datetime(&date_time)
        }
    }
}

/// Unfolds continuation lines, rewrites line endings to CRLF and replaces
/// escaped backslashes with [`ESCAPED_BACKSLASH`].
///
/// Server payloads arrive with CRLF, bare LF, or a mix (XML transport does
/// not preserve CR reliably). Blank lines are dropped.
fn normalize(raw: &str) -> String {
    let unix = raw.replace("\r\n", "\n").replace('\r', "\n");
    let unfolded = unix.replace("\n ", "").replace("\n\t", "");

    let mut out = String::with_capacity(unfolded.len() + 64);
    for line in unfolded.lines().filter(|line| !line.trim().is_empty()) {
        let mut chars = line.chars();
        while let Some(ch) = chars.next() {
            if ch != '\\' {
                out.push(ch);
                continue;
            }
            // An escape sequence is always two characters.
            match chars.next() {
                Some('\\') => out.push(ESCAPED_BACKSLASH),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        }
        out.push_str("\r\n");
    }
    out
}

/// An encoded calendar object ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEvent {
    pub uid: String,
    pub ics: String,
}

/// Encodes a new event with a fresh UID, stamped now.
pub fn encode(spec: &NewEventSpec) -> DavResult<EncodedEvent> {
    encode_with(spec, generate_uid(), Utc::now())
}

/// Encodes a new event with the given UID and DTSTAMP.
///
/// SUMMARY, DESCRIPTION and LOCATION are escaped as TEXT, so commas,
/// semicolons, backslashes and line feeds survive a round trip.
///
/// # Errors
///
/// Returns an `Encode` error when the summary is blank, when a text field
/// contains a carriage return, or when the event ends before it starts.
pub fn encode_with(
    spec: &NewEventSpec,
    uid: String,
    dtstamp: DateTime<Utc>,
) -> DavResult<EncodedEvent> {
    if spec.summary.trim().is_empty() {
        return Err(DavError::encode("event summary is required"));
    }
    if spec.end < spec.start {
        return Err(DavError::encode(format!(
            "event ends ({}) before it starts ({})",
            spec.end, spec.start
        )));
    }
    let description = optional_text("DESCRIPTION", spec.description.as_deref())?;
    let location = optional_text("LOCATION", spec.location.as_deref())?;
    check_text("SUMMARY", &spec.summary)?;

    let mut event = Event::new();
    event
        .uid(&uid)
        .summary(&spec.summary)
        .add_property("DTSTAMP", format_ical_utc(dtstamp))
        .add_property("DTSTART", format_ical_utc(spec.start))
        .add_property("DTEND", format_ical_utc(spec.end));
    if let Some(description) = description {
        event.description(description);
    }
    if let Some(location) = location {
        event.location(location);
    }

    let calendar = Calendar::empty()
        .append_property(("VERSION", "2.0"))
        .append_property(("PRODID", PRODID))
        .push(event.done())
        .done();

    Ok(EncodedEvent {
        uid,
        ics: calendar.to_string(),
    })
}

fn optional_text<'a>(name: &str, value: Option<&'a str>) -> DavResult<Option<&'a str>> {
    match value.filter(|v| !v.is_empty()) {
        Some(value) => check_text(name, value).map(|()| Some(value)),
        None => Ok(None),
    }
}

/// TEXT escaping covers line feeds but has no form for a bare CR.
fn check_text(name: &str, value: &str) -> DavResult<()> {
    if value.contains('\r') {
        return Err(DavError::encode(format!(
            "{} must not contain carriage returns",
            name.to_lowercase()
        )));
    }
    Ok(())
}

/// Generates a UID: 13 random base-36 characters plus a fixed domain.
pub fn generate_uid() -> String {
    let mut rng = rand::rng();
    let token: String = (0..13)
        .map(|_| char::from_digit(rng.random_range(0..36), 36).unwrap_or('0'))
        .collect();
    format!("{}@{}", token, UID_DOMAIN)
}
