//! Data model shared by the CalDAV layer and its callers.
//!
//! These are plain values: the protocol layer produces them and hands them
//! back, it never retains them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Server location and basic-auth credentials for one invocation.
///
/// The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Base URL of the CalDAV server.
    pub server_url: Url,
    /// Username for basic authentication.
    pub username: String,
    /// Password for basic authentication.
    pub password: String,
}

impl Credentials {
    /// Creates credentials, parsing the server URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(
        server_url: impl AsRef<str>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            server_url: Url::parse(server_url.as_ref())?,
            username: username.into(),
            password: password.into(),
        })
    }

    /// Returns the server URL with any embedded userinfo removed.
    pub fn redacted_server_url(&self) -> String {
        redact_url(&self.server_url)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server_url", &self.redacted_server_url())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Strips username and password from a URL for display.
pub fn redact_url(url: &Url) -> String {
    let mut clean = url.clone();
    // Only fails for cannot-be-a-base URLs, which carry no userinfo anyway.
    let _ = clean.set_username("");
    let _ = clean.set_password(None);
    clean.to_string()
}

/// A calendar collection discovered under the calendar home.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    /// Identifier for the calendar (its absolute collection URL).
    pub id: String,
    /// Absolute URL of the calendar collection.
    pub url: String,
    /// Human-readable name. Not guaranteed unique.
    pub display_name: String,
    /// Component types the server advertises (e.g. `VEVENT`, `VTODO`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_components: Vec<String>,
    /// Calendar description, if the server provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Calendar color (Apple extension).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Collection change tag (calendarserver extension).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctag: Option<String>,
}

impl Calendar {
    /// Creates a calendar with the given URL and display name.
    pub fn new(url: impl Into<String>, display_name: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: url.clone(),
            url,
            display_name: display_name.into(),
            supported_components: Vec::new(),
            description: None,
            color: None,
            ctag: None,
        }
    }

    /// Builder method to set the supported component types.
    pub fn with_supported_components<I, S>(mut self, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_components = components.into_iter().map(Into::into).collect();
        self
    }

    /// Returns true if the calendar accepts the given component type.
    ///
    /// Servers that advertise nothing are assumed to accept everything.
    pub fn supports(&self, component: &str) -> bool {
        self.supported_components.is_empty()
            || self
                .supported_components
                .iter()
                .any(|c| c.eq_ignore_ascii_case(component))
    }
}

/// A stored calendar resource as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarObject {
    /// Absolute URL of the resource.
    pub url: String,
    /// Opaque concurrency token assigned by the server.
    pub etag: Option<String>,
    /// Raw iCalendar text.
    pub data: String,
}

/// Location and version of a calendar object after a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarObjectRef {
    /// Absolute URL of the created resource.
    pub url: String,
    /// ETag reported by the server, if any.
    pub etag: Option<String>,
}

/// One occurrence of a property passed through without interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub value: String,
    /// Parameters such as `TZID` or `CN`, by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl PropertyValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            params: BTreeMap::new(),
        }
    }

    /// Builder method to add a parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// One VEVENT decoded from a calendar object.
///
/// `description` and `location` are empty strings when the component omits
/// them, so a record decoded from an event we created compares equal to the
/// spec it was created from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// URL of the calendar object this event came from.
    pub url: String,
    /// ETag of the calendar object this event came from.
    pub etag: Option<String>,
    pub uid: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// DTSTAMP of the component.
    pub dtstamp: Option<DateTime<Utc>>,
    /// Raw RECURRENCE-ID, set on expanded occurrences of a recurring event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Every other property of the component, by name, in document order
    /// for repeated properties.
    #[serde(default)]
    pub properties: BTreeMap<String, Vec<PropertyValue>>,
}

/// Input for creating a new event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEventSpec {
    /// Display name of the target calendar.
    pub calendar_name: String,
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl NewEventSpec {
    /// Creates a spec with the required fields.
    pub fn new(
        calendar_name: impl Into<String>,
        summary: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            calendar_name: calendar_name.into(),
            summary: summary.into(),
            description: None,
            location: None,
            start,
            end,
        }
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}
