//! HTTP transport configuration.

use std::time::Duration;

/// Configuration for the HTTP transport.
///
/// The server URL and credentials are per-invocation input and live in
/// [`davbridge_core::Credentials`]; this only carries connection policy.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound for every request, from connect to the last body byte.
    pub timeout: Duration,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// User agent string.
    pub user_agent: String,
}

impl TransportConfig {
    /// Default timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            verify_tls: true,
            user_agent: format!("davbridge/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Disables TLS verification (for testing only).
    pub fn with_insecure_tls(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new()
    }
}
