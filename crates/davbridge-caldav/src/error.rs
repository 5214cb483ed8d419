//! Error types for CalDAV operations.
//!
//! Every failure surfaces as a [`DavError`] carrying one of a closed set of
//! [`DavErrorKind`]s plus enough context (server, calendar, resource, HTTP
//! status) to act on it. Credentials are never part of an error.

use std::fmt;
use thiserror::Error;

/// The category of a CalDAV error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DavErrorKind {
    /// Credentials were rejected or access was denied.
    Auth,
    /// Unreachable host, timeout, unexpected status or malformed response.
    Network,
    /// A named calendar or a remote resource does not exist.
    NotFound,
    /// An iCalendar payload violates the grammar of a property we read.
    Decode,
    /// Request input violates a required invariant (e.g. empty summary).
    Encode,
}

impl DavErrorKind {
    /// Returns a stable snake_case name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth_error",
            Self::Network => "network_error",
            Self::NotFound => "not_found",
            Self::Decode => "decode_error",
            Self::Encode => "encode_error",
        }
    }
}

impl fmt::Display for DavErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while talking to a CalDAV server or handling its data.
#[derive(Debug, Error)]
pub struct DavError {
    kind: DavErrorKind,
    message: String,
    /// Server URL, userinfo stripped.
    server_url: Option<String>,
    /// Display name of the calendar involved.
    calendar: Option<String>,
    /// URL of the resource involved.
    resource: Option<String>,
    /// HTTP status returned by the server.
    status: Option<u16>,
    /// Set when a write may or may not have been applied.
    outcome_unknown: bool,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DavError {
    /// Creates a new error with the given kind and message.
    pub fn new(kind: DavErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            server_url: None,
            calendar: None,
            resource: None,
            status: None,
            outcome_unknown: false,
            source: None,
        }
    }

    /// Creates an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(DavErrorKind::Auth, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(DavErrorKind::Network, message)
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(DavErrorKind::NotFound, message)
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(DavErrorKind::Decode, message)
    }

    /// Creates an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::new(DavErrorKind::Encode, message)
    }

    /// Maps an HTTP status code to an error, or `None` for success codes.
    pub fn from_status(status: u16, resource: impl Into<String>) -> Option<Self> {
        let error = match status {
            200..=299 => return None,
            401 => Self::auth("server rejected the credentials"),
            403 => Self::auth("access denied"),
            404 => Self::not_found("resource not found"),
            s if s >= 500 => Self::network("server error"),
            _ => Self::network("unexpected response status"),
        };
        Some(error.with_status(status).with_resource(resource))
    }

    /// Sets the server URL. Any userinfo must already be stripped.
    pub fn with_server(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = Some(server_url.into());
        self
    }

    /// Sets the calendar display name.
    pub fn with_calendar(mut self, calendar: impl Into<String>) -> Self {
        self.calendar = Some(calendar.into());
        self
    }

    /// Sets the resource URL, keeping an existing one.
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        if self.resource.is_none() {
            self.resource = Some(resource.into());
        }
        self
    }

    /// Sets the HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Marks a failed write whose server-side effect is unknown.
    pub fn with_unknown_outcome(mut self) -> Self {
        self.outcome_unknown = true;
        self
    }

    /// Sets the source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> DavErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn server_url(&self) -> Option<&str> {
        self.server_url.as_deref()
    }

    pub fn calendar(&self) -> Option<&str> {
        self.calendar.as_deref()
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns true when a write may have been persisted despite the error.
    ///
    /// Nothing is rolled back or retried; the caller must reconcile.
    pub fn outcome_unknown(&self) -> bool {
        self.outcome_unknown
    }
}

impl fmt::Display for DavError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref server) = self.server_url {
            write!(f, "[{}] ", server)?;
        }
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(ref calendar) = self.calendar {
            write!(f, " (calendar \"{}\")", calendar)?;
        }
        if let Some(status) = self.status {
            write!(f, " (status {})", status)?;
        }
        if let Some(ref resource) = self.resource {
            write!(f, " at {}", resource)?;
        }
        if let Some(ref source) = self.source {
            write!(f, ": {}", source)?;
        }
        if self.outcome_unknown {
            write!(
                f,
                "; the write may have been applied on the server, verify before retrying"
            )?;
        }
        Ok(())
    }
}

/// A specialized Result type for CalDAV operations.
pub type DavResult<T> = Result<T, DavError>;
