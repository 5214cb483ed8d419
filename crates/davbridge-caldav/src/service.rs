//! High-level entry points taking raw credentials.
//!
//! Every call opens its own [`Session`], does its work, and closes the
//! session before returning, whatever the outcome. Nothing is cached
//! between calls.

use tracing::debug;

use davbridge_core::{
    Calendar, CalendarObjectRef, Credentials, EventRecord, NewEventSpec, TimeWindow,
};

use crate::config::TransportConfig;
use crate::directory;
use crate::error::{DavError, DavResult};
use crate::query;
use crate::session::Session;
use crate::transport::{Connector, HttpConnector};
use crate::writer;

/// CalDAV client facade over an injectable [`Connector`].
#[derive(Debug, Clone, Default)]
pub struct CalDavService<C = HttpConnector> {
    connector: C,
}

impl CalDavService<HttpConnector> {
    /// Creates a service talking HTTP with the given settings.
    pub fn http(config: TransportConfig) -> Self {
        Self::new(HttpConnector::new(config))
    }
}

impl<C: Connector> CalDavService<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Lists every calendar in the user's calendar home.
    pub async fn list_calendars(&self, credentials: &Credentials) -> DavResult<Vec<Calendar>> {
        let session = self.open(credentials).await?;
        let result = directory::list_calendars(&session).await;
        session.close();
        result.map_err(|e| e.with_server(credentials.redacted_server_url()))
    }

    /// Lists the events of the named calendar between two ISO 8601 instants.
    ///
    /// # Errors
    ///
    /// Returns an `Encode` error, without contacting the server, when either
    /// instant is unparseable or `end` precedes `start`.
    pub async fn list_events(
        &self,
        credentials: &Credentials,
        calendar_name: &str,
        start: &str,
        end: &str,
    ) -> DavResult<Vec<EventRecord>> {
        let window = TimeWindow::parse(start, end).map_err(|e| {
            DavError::encode("invalid time window")
                .with_calendar(calendar_name)
                .with_source(e)
        })?;
        self.list_events_in(credentials, calendar_name, &window)
            .await
    }

    /// Lists the events of the named calendar overlapping `window`.
    pub async fn list_events_in(
        &self,
        credentials: &Credentials,
        calendar_name: &str,
        window: &TimeWindow,
    ) -> DavResult<Vec<EventRecord>> {
        let session = self.open(credentials).await?;
        let result = async {
            let calendar = directory::resolve_by_name(&session, calendar_name).await?;
            query::query_events(&session, &calendar, window).await
        }
        .await;
        session.close();
        result.map_err(|e| {
            e.with_calendar(calendar_name)
                .with_server(credentials.redacted_server_url())
        })
    }

    /// Creates an event in the calendar named by `spec`.
    pub async fn create_event(
        &self,
        credentials: &Credentials,
        spec: &NewEventSpec,
    ) -> DavResult<CalendarObjectRef> {
        let session = self.open(credentials).await?;
        let result = async {
            let calendar = directory::resolve_by_name(&session, &spec.calendar_name).await?;
            writer::create_event(&session, &calendar, spec).await
        }
        .await;
        session.close();
        result.map_err(|e| {
            e.with_calendar(spec.calendar_name.clone())
                .with_server(credentials.redacted_server_url())
        })
    }

    async fn open(&self, credentials: &Credentials) -> DavResult<Session> {
        debug!(
            server = %credentials.redacted_server_url(),
            username = %credentials.username,
            "Opening session"
        );
        Session::open(&self.connector, credentials)
            .await
            .map_err(|e| e.with_server(credentials.redacted_server_url()))
    }
}
