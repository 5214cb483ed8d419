//! CalDAV client.
//!
//! Layers, leaves first:
//!
//! - [`ics`] - iCalendar decoding and encoding
//! - [`transport`] - the [`DavTransport`] seam and its reqwest implementation
//! - [`session`] - principal and calendar-home discovery
//! - [`directory`] - calendar enumeration and lookup by name
//! - [`query`] - time-range event queries
//! - [`writer`] - event creation
//! - [`service`] - per-call entry points taking raw [`Credentials`]
//!
//! # Example
//!
//! ```ignore
//! use davbridge_caldav::{CalDavService, TransportConfig};
//! use davbridge_core::Credentials;
//!
//! async fn today(credentials: &Credentials) -> davbridge_caldav::DavResult<()> {
//!     let service = CalDavService::http(TransportConfig::default());
//!     let events = service
//!         .list_events(credentials, "Work", "2025-01-01T00:00:00Z", "2025-01-02T00:00:00Z")
//!         .await?;
//!     println!("{} events", events.len());
//!     Ok(())
//! }
//! ```
//!
//! [`Credentials`]: davbridge_core::Credentials

pub mod config;
pub mod directory;
pub mod error;
pub mod ics;
pub mod query;
pub mod service;
pub mod session;
pub mod transport;
pub mod writer;
mod xml;

#[cfg(test)]
mod testing;

pub use config::TransportConfig;
pub use error::{DavError, DavErrorKind, DavResult};
pub use service::CalDavService;
pub use session::Session;
pub use transport::{
    BoxFuture, Connector, DavMethod, DavRequest, DavResponse, DavTransport, HttpConnector,
    HttpTransport,
};
