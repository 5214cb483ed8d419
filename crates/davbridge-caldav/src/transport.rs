//! HTTP transport for WebDAV/CalDAV requests.
//!
//! [`DavTransport`] is the seam between the protocol logic and the wire.
//! [`HttpTransport`] is the reqwest implementation; a [`Connector`] builds
//! one transport per set of credentials, so callers and tests can inject
//! their own.
//!
//! Transports return every HTTP response as-is; status interpretation is
//! shared in [`DavResponse::error_for_status`].

use std::future::Future;
use std::pin::Pin;

use base64::Engine;
use reqwest::{Client, Method};
use tracing::trace;
use url::Url;

use davbridge_core::{Credentials, redact_url};

use crate::config::TransportConfig;
use crate::error::{DavError, DavResult};

/// A boxed future, so [`DavTransport`] stays object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Content type for WebDAV XML bodies.
pub const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

/// Content type for iCalendar bodies.
pub const ICS_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// HTTP methods used by the CalDAV layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DavMethod {
    Propfind,
    Report,
    Put,
}

impl DavMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Propfind => "PROPFIND",
            Self::Report => "REPORT",
            Self::Put => "PUT",
        }
    }

    /// Returns true for methods that change server state.
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Put)
    }
}

/// A single WebDAV request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavRequest {
    pub method: DavMethod,
    pub url: Url,
    /// `Depth` header, when the method takes one.
    pub depth: Option<u8>,
    pub content_type: &'static str,
    pub body: String,
}

impl DavRequest {
    /// A PROPFIND with the given depth.
    pub fn propfind(url: Url, body: String, depth: u8) -> Self {
        Self {
            method: DavMethod::Propfind,
            url,
            depth: Some(depth),
            content_type: XML_CONTENT_TYPE,
            body,
        }
    }

    /// A REPORT against a collection (Depth 1).
    pub fn report(url: Url, body: String) -> Self {
        Self {
            method: DavMethod::Report,
            url,
            depth: Some(1),
            content_type: XML_CONTENT_TYPE,
            body,
        }
    }

    /// A PUT storing an iCalendar object.
    pub fn put_calendar_object(url: Url, ics: String) -> Self {
        Self {
            method: DavMethod::Put,
            url,
            depth: None,
            content_type: ICS_CONTENT_TYPE,
            body: ics,
        }
    }
}

/// A raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavResponse {
    pub status: u16,
    /// Final URL after redirects; hrefs in the body resolve against it.
    pub url: Url,
    /// `ETag` header, verbatim.
    pub etag: Option<String>,
    pub body: String,
}

impl DavResponse {
    /// Turns non-success statuses into the matching [`DavError`].
    pub fn error_for_status(self) -> DavResult<Self> {
        match DavError::from_status(self.status, redact_url(&self.url)) {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }
}

/// Sends WebDAV requests on behalf of one authenticated principal.
pub trait DavTransport: Send + Sync {
    /// Sends a request and returns the response whatever its status.
    ///
    /// # Errors
    ///
    /// Returns a `Network` error when no response was received, including
    /// on timeout.
    fn send(&self, request: DavRequest) -> BoxFuture<'_, DavResult<DavResponse>>;
}

/// Builds a transport bound to a set of credentials.
///
/// This is the session factory: every operation asks it for a fresh
/// transport, so substituting it swaps out the network.
pub trait Connector: Send + Sync {
    /// Creates a transport for the given credentials.
    fn connect(&self, credentials: &Credentials) -> DavResult<Box<dyn DavTransport>>;
}

/// Connector producing [`HttpTransport`]s.
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    config: TransportConfig,
}

impl HttpConnector {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Connector for HttpConnector {
    fn connect(&self, credentials: &Credentials) -> DavResult<Box<dyn DavTransport>> {
        Ok(Box::new(HttpTransport::new(&self.config, credentials)?))
    }
}

/// reqwest-backed transport using HTTP Basic authentication.
pub struct HttpTransport {
    client: Client,
    authorization: String,
}

impl HttpTransport {
    /// Creates a transport for the given credentials.
    pub fn new(config: &TransportConfig, credentials: &Credentials) -> DavResult<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| DavError::network("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            client,
            authorization: basic_auth(&credentials.username, &credentials.password),
        })
    }

    async fn execute(&self, request: DavRequest) -> DavResult<DavResponse> {
        let method = Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| DavError::network("invalid HTTP method").with_source(e))?;
        let target = redact_url(&request.url);
        let is_write = request.method.is_write();

        let mut builder = self
            .client
            .request(method, request.url)
            .header("Authorization", &self.authorization)
            .header("Content-Type", request.content_type);

        if let Some(depth) = request.depth {
            builder = builder.header("Depth", depth.to_string());
        }

        trace!(method = %request.method.as_str(), url = %target, "Sending request");

        let response = builder.body(request.body).send().await.map_err(|e| {
            let err = if e.is_timeout() {
                DavError::network("request timed out")
            } else {
                DavError::network("request failed")
            };
            // A connect failure means nothing reached the server.
            let err = if is_write && !e.is_connect() {
                err.with_unknown_outcome()
            } else {
                err
            };
            err.with_resource(target.clone()).with_source(e)
        })?;

        let status = response.status().as_u16();
        let url = response.url().clone();
        let etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        trace!(status, url = %target, "Received response");

        let body = response.text().await.map_err(|e| {
            let err = if e.is_timeout() {
                DavError::network("timed out reading response")
            } else {
                DavError::network("failed to read response")
            };
            err.with_status(status).with_resource(target.clone()).with_source(e)
        })?;

        Ok(DavResponse {
            status,
            url,
            etag,
            body,
        })
    }
}

impl DavTransport for HttpTransport {
    fn send(&self, request: DavRequest) -> BoxFuture<'_, DavResult<DavResponse>> {
        Box::pin(self.execute(request))
    }
}

/// Generates a Basic authentication header value.
pub fn basic_auth(username: &str, password: &str) -> String {
    let credentials = format!("{}:{}", username, password);
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
    format!("Basic {}", encoded)
}
