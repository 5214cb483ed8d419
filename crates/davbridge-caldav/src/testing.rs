//! In-memory CalDAV server for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use url::Url;

use davbridge_core::Credentials;

use crate::error::{DavError, DavResult};
use crate::transport::{BoxFuture, Connector, DavMethod, DavRequest, DavResponse, DavTransport};

const USERNAME: &str = "alice";
const PASSWORD: &str = "secret";

#[derive(Debug, Clone)]
enum Reply {
    Response {
        status: u16,
        etag: Option<String>,
        body: String,
    },
    Timeout,
}

#[derive(Default)]
struct State {
    routes: HashMap<(DavMethod, String), Reply>,
    requests: Vec<DavRequest>,
}

/// Scripted server: each (method, URL) pair answers with a fixed reply,
/// anything else is a 404.
#[derive(Clone)]
pub(crate) struct FakeServer {
    base: Url,
    password: Option<String>,
    state: Arc<Mutex<State>>,
}

impl FakeServer {
    pub(crate) fn new(base: &str) -> Self {
        Self {
            base: Url::parse(base).unwrap(),
            password: None,
            state: Arc::default(),
        }
    }

    /// Answers 401 to every request made with a different password.
    pub(crate) fn require_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub(crate) fn route(self, method: DavMethod, url: &str, status: u16, body: &str) -> Self {
        self.insert(
            method,
            url,
            Reply::Response {
                status,
                etag: None,
                body: body.to_string(),
            },
        )
    }

    pub(crate) fn propfind(self, url: &str, body: impl Into<String>) -> Self {
        let body = body.into();
        self.route(DavMethod::Propfind, url, 207, &body)
    }

    pub(crate) fn report(self, url: &str, body: impl Into<String>) -> Self {
        let body = body.into();
        self.route(DavMethod::Report, url, 207, &body)
    }

    pub(crate) fn put(self, url: &str, status: u16, etag: Option<&str>) -> Self {
        self.insert(
            DavMethod::Put,
            url,
            Reply::Response {
                status,
                etag: etag.map(str::to_string),
                body: String::new(),
            },
        )
    }

    /// Makes a route behave like a request that never got an answer.
    pub(crate) fn stall(self, method: DavMethod, url: &str) -> Self {
        self.insert(method, url, Reply::Timeout)
    }

    fn insert(self, method: DavMethod, url: &str, reply: Reply) -> Self {
        let key = (method, Url::parse(url).unwrap().to_string());
        self.state.lock().unwrap().routes.insert(key, reply);
        self
    }

    pub(crate) fn credentials(&self) -> Credentials {
        let password = self.password.as_deref().unwrap_or(PASSWORD);
        Credentials::new(self.base.as_str(), USERNAME, password).unwrap()
    }

    pub(crate) fn connector(&self) -> FakeConnector {
        FakeConnector {
            server: self.clone(),
        }
    }

    /// Every request received so far, in order.
    pub(crate) fn requests(&self) -> Vec<DavRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    fn answer(&self, request: DavRequest, password: &str) -> DavResult<DavResponse> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());

        let url = request.url.clone();
        if self.password.as_deref().is_some_and(|p| p != password) {
            return Ok(DavResponse {
                status: 401,
                url,
                etag: None,
                body: String::new(),
            });
        }

        match state.routes.get(&(request.method, url.to_string())) {
            Some(Reply::Response { status, etag, body }) => Ok(DavResponse {
                status: *status,
                url,
                etag: etag.clone(),
                body: body.clone(),
            }),
            Some(Reply::Timeout) => {
                let err = DavError::network("request timed out").with_resource(url.to_string());
                Err(if request.method.is_write() {
                    err.with_unknown_outcome()
                } else {
                    err
                })
            }
            None => Ok(DavResponse {
                status: 404,
                url,
                etag: None,
                body: String::new(),
            }),
        }
    }
}

pub(crate) struct FakeConnector {
    server: FakeServer,
}

impl Connector for FakeConnector {
    fn connect(&self, credentials: &Credentials) -> DavResult<Box<dyn DavTransport>> {
        Ok(Box::new(FakeTransport {
            server: self.server.clone(),
            password: credentials.password.clone(),
        }))
    }
}

struct FakeTransport {
    server: FakeServer,
    password: String,
}

impl DavTransport for FakeTransport {
    fn send(&self, request: DavRequest) -> BoxFuture<'_, DavResult<DavResponse>> {
        let result = self.server.answer(request, &self.password);
        Box::pin(async move { result })
    }
}

/// A multistatus with a single href-valued property on `path`.
///
/// An empty `href` yields the property with no href inside.
pub(crate) fn multistatus_href(path: &str, property: &str, href: &str) -> String {
    let value = if href.is_empty() {
        String::new()
    } else {
        format!("<d:href>{}</d:href>", href)
    };
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>{path}</d:href>
    <d:propstat>
      <d:prop><d:{property}>{value}</d:{property}></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#
    )
}

/// One calendar collection `<response>` for a Depth 1 PROPFIND.
pub(crate) fn calendar_response(href: &str, name: Option<&str>, components: &[&str]) -> String {
    let name = name
        .map(|n| format!("<d:displayname>{}</d:displayname>", n))
        .unwrap_or_default();
    let components: String = components
        .iter()
        .map(|c| format!(r#"<c:comp name="{}"/>"#, c))
        .collect();
    format!(
        r#"<d:response>
    <d:href>{href}</d:href>
    <d:propstat>
      <d:prop>
        {name}
        <d:resourcetype><d:collection/><c:calendar/></d:resourcetype>
        <c:supported-calendar-component-set>{components}</c:supported-calendar-component-set>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>"#
    )
}

/// One calendar object `<response>` for a calendar-query REPORT.
pub(crate) fn object_response(href: &str, etag: &str, ics: &str) -> String {
    format!(
        r#"<d:response>
    <d:href>{href}</d:href>
    <d:propstat>
      <d:prop>
        <d:getetag>{etag}</d:getetag>
        <c:calendar-data><![CDATA[{ics}]]></c:calendar-data>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>"#
    )
}

pub(crate) fn multistatus(responses: &[String]) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
{}
</d:multistatus>"#,
        responses.join("\n")
    )
}

/// A VCALENDAR wrapping one timed VEVENT.
pub(crate) fn vevent(uid: &str, summary: &str, start: &str, end: &str) -> String {
    format!(
        "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//EN\r\nBEGIN:VEVENT\r\nUID:{uid}\r\nDTSTAMP:20241201T000000Z\r\nDTSTART:{start}\r\nDTEND:{end}\r\nSUMMARY:{summary}\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n"
    )
}

/// Scripts principal discovery so the calendar home is `/calendars/alice/`.
pub(crate) fn discoverable(base: &str) -> FakeServer {
    let server = FakeServer::new(base);
    let root = server.base.clone();
    let principal = root.join("/principals/alice/").unwrap();
    server
        .propfind(
            root.as_str(),
            multistatus_href(root.path(), "current-user-principal", principal.path()),
        )
        .propfind(
            principal.as_str(),
            multistatus_href(principal.path(), "calendar-home-set", "/calendars/alice/"),
        )
}

pub(crate) const HOME: &str = "https://dav.example.com/calendars/alice/";
