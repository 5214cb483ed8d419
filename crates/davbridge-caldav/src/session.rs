//! Authenticated session with a CalDAV server.
//!
//! Opening a session performs principal discovery:
//!
//! 1. `PROPFIND` (Depth 0) on the server URL for `current-user-principal`
//! 2. `PROPFIND` (Depth 0) on the principal for `calendar-home-set`
//!
//! Servers that answer neither property (e.g. a URL that already points at
//! the calendar home) fall back to the server URL and the principal URL
//! respectively.

use tracing::{debug, info};
use url::Url;

use davbridge_core::{Credentials, redact_url};

use crate::error::{DavError, DavResult};
use crate::transport::{Connector, DavRequest, DavResponse, DavTransport};
use crate::xml::{parse_href_property, propfind_home_body, propfind_principal_body};

/// A connection bound to one principal and its calendar home.
///
/// Sessions are created per operation and must not be shared between
/// concurrent operations.
pub struct Session {
    transport: Box<dyn DavTransport>,
    server_url: Url,
    principal_url: Url,
    calendar_home_url: Url,
}

impl Session {
    /// Connects and discovers the principal and its calendar home.
    ///
    /// # Errors
    ///
    /// Returns an `Auth` error when credentials are rejected and a `Network`
    /// error when the server cannot be reached or answers garbage.
    pub async fn open(connector: &dyn Connector, credentials: &Credentials) -> DavResult<Self> {
        let transport = connector.connect(credentials)?;
        let server_url = credentials.server_url.clone();

        debug!(server = %redact_url(&server_url), "Discovering principal");
        let response = send_ok(
            transport.as_ref(),
            DavRequest::propfind(server_url.clone(), xml_body(propfind_principal_body())?, 0),
        )
        .await?;
        let principal_url = resolve_property(&response, "current-user-principal")?
            .unwrap_or_else(|| server_url.clone());

        debug!(principal = %redact_url(&principal_url), "Discovering calendar home");
        let response = send_ok(
            transport.as_ref(),
            DavRequest::propfind(principal_url.clone(), xml_body(propfind_home_body())?, 0),
        )
        .await?;
        let calendar_home_url = resolve_property(&response, "calendar-home-set")?
            .unwrap_or_else(|| principal_url.clone());

        info!(
            server = %redact_url(&server_url),
            home = %redact_url(&calendar_home_url),
            "Session opened"
        );

        Ok(Self {
            transport,
            server_url,
            principal_url,
            calendar_home_url,
        })
    }

    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    pub fn principal_url(&self) -> &Url {
        &self.principal_url
    }

    /// Collection holding the principal's calendars.
    pub fn calendar_home_url(&self) -> &Url {
        &self.calendar_home_url
    }

    /// Sends a PROPFIND and returns the successful response.
    pub async fn propfind(&self, url: &Url, body: String, depth: u8) -> DavResult<DavResponse> {
        send_ok(
            self.transport.as_ref(),
            DavRequest::propfind(url.clone(), body, depth),
        )
        .await
    }

    /// Sends a REPORT and returns the successful response.
    pub async fn report(&self, url: &Url, body: String) -> DavResult<DavResponse> {
        send_ok(self.transport.as_ref(), DavRequest::report(url.clone(), body)).await
    }

    /// Stores a calendar object and returns the successful response.
    pub async fn put(&self, url: &Url, ics: String) -> DavResult<DavResponse> {
        send_ok(
            self.transport.as_ref(),
            DavRequest::put_calendar_object(url.clone(), ics),
        )
        .await
    }

    /// Releases the session.
    pub fn close(self) {
        debug!(server = %redact_url(&self.server_url), "Session closed");
    }
}

async fn send_ok(transport: &dyn DavTransport, request: DavRequest) -> DavResult<DavResponse> {
    transport.send(request).await?.error_for_status()
}

fn xml_body(body: Result<String, quick_xml::Error>) -> DavResult<String> {
    body.map_err(|e| DavError::encode("failed to build request body").with_source(e))
}

/// Reads an href-valued property and resolves it against the response URL.
fn resolve_property(response: &DavResponse, property: &str) -> DavResult<Option<Url>> {
    let href = parse_href_property(&response.body, property).map_err(|e| {
        DavError::network("malformed multistatus response")
            .with_resource(redact_url(&response.url))
            .with_source(e)
    })?;

    match href {
        Some(href) => response.url.join(&href).map(Some).map_err(|e| {
            DavError::network(format!("invalid {} href `{}`", property, href))
                .with_resource(redact_url(&response.url))
                .with_source(e)
        }),
        None => Ok(None),
    }
}
