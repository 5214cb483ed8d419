//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/davbridge/config.toml` by default:
//!
//! ```toml
//! [server]
//! url = "https://dav.example.com/"
//! username = "alice"
//! password = "env::DAVBRIDGE_PASSWORD"
//! timeout = 30
//! verify_tls = true
//! ```
//!
//! The password supports secret references:
//! - `pass::path/in/store` resolved via `pass show`
//! - `env::VAR_NAME` resolved from the environment
//! - plain text used as-is

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use davbridge_caldav::TransportConfig;
use davbridge_core::{Credentials, TracingConfig};

use crate::cli::ServerArgs;

/// Configuration for the davbridge client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug logging, same as passing `--debug`.
    pub debug: bool,

    /// Server/connection settings.
    pub server: ServerSettings,
}

/// Server/connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// CalDAV server URL.
    pub url: Option<String>,

    /// Username for basic authentication.
    pub username: Option<String>,

    /// Password (supports `pass::` and `env::` prefixes).
    pub password: Option<String>,

    /// Request timeout in seconds.
    pub timeout: u64,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            timeout: TransportConfig::DEFAULT_TIMEOUT_SECS,
            verify_tls: true,
        }
    }
}

impl ServerSettings {
    /// Applies command-line overrides.
    pub fn merge(&mut self, args: &ServerArgs) {
        if let Some(ref url) = args.url {
            self.url = Some(url.clone());
        }
        if let Some(ref username) = args.username {
            self.username = Some(username.clone());
        }
        if let Some(ref password) = args.password {
            self.password = Some(password.clone());
        }
        if let Some(timeout) = args.timeout {
            self.timeout = timeout;
        }
    }

    /// Builds credentials, resolving the password reference.
    pub fn credentials(&self) -> Result<Credentials, String> {
        let url = self.url.as_deref().ok_or_else(|| {
            format!(
                "server URL not set. Pass --url, set DAVBRIDGE_URL, or add to {}:\n  \
                 [server]\n  \
                 url = \"https://dav.example.com/\"",
                ClientConfig::default_path().display()
            )
        })?;
        let username = self
            .username
            .as_deref()
            .ok_or_else(|| "username not set (--username or [server] username)".to_string())?;
        let raw_password = self
            .password
            .as_deref()
            .ok_or_else(|| "password not set (--password or [server] password)".to_string())?;

        let password = crate::secret::resolve(raw_password)
            .map_err(|e| format!("failed to resolve password: {}", e))?;

        Credentials::new(url, username, password)
            .map_err(|e| format!("invalid server URL `{}`: {}", url, e))
    }

    /// Converts to transport configuration.
    pub fn transport_config(&self) -> TransportConfig {
        let config = TransportConfig::new().with_timeout(Duration::from_secs(self.timeout));
        if self.verify_tls {
            config
        } else {
            config.with_insecure_tls()
        }
    }
}

impl ClientConfig {
    /// Loads the file named by `--config`, or the default file if present.
    pub fn load_for(explicit: Option<&Path>) -> Result<Self, String> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    /// Loads configuration from the default path.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Path configuration is read from: `--config` when given, else the default.
    pub fn effective_path(explicit: Option<&Path>) -> PathBuf {
        explicit.map_or_else(Self::default_path, Path::to_path_buf)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("davbridge")
    }

    /// Logging setup: debug when either the flag or the file asks for it.
    pub fn tracing_config(&self, debug_flag: bool) -> TracingConfig {
        if debug_flag || self.debug {
            TracingConfig::cli_debug()
        } else {
            TracingConfig::default()
        }
    }

    /// Returns a copy safe to print: literal passwords are masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(ref password) = copy.server.password
            && !crate::secret::is_reference(password)
        {
            copy.server.password = Some("********".to_string());
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn settings() -> ServerSettings {
        ServerSettings {
            url: Some("https://dav.example.com/".to_string()),
            username: Some("alice".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server.timeout, 30);
        assert!(config.server.verify_tls);
        assert!(config.server.url.is_none());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
url = "https://dav.example.com/"
username = "alice"
password = "env::DAVBRIDGE_TEST_PW"
timeout = 10
verify_tls = false
"#
        )
        .unwrap();

        let config = ClientConfig::load_from(file.path()).unwrap();
        assert_eq!(config.server.url.as_deref(), Some("https://dav.example.com/"));
        assert_eq!(config.server.timeout, 10);
        assert!(!config.server.verify_tls);

        let transport = config.server.transport_config();
        assert_eq!(transport.timeout, Duration::from_secs(10));
        assert!(!transport.verify_tls);
    }

    #[test]
    fn debug_from_file_enables_debug_logging() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "debug = true").unwrap();

        let config = ClientConfig::load_for(Some(file.path())).unwrap();
        assert!(config.debug);
        assert_eq!(config.tracing_config(false), TracingConfig::cli_debug());
        assert_eq!(
            ClientConfig::default().tracing_config(false),
            TracingConfig::default()
        );
        assert_eq!(
            ClientConfig::default().tracing_config(true),
            TracingConfig::cli_debug()
        );
    }

    #[test]
    fn effective_path_prefers_explicit() {
        let explicit = Path::new("/tmp/other/davbridge.toml");
        assert_eq!(ClientConfig::effective_path(Some(explicit)), explicit);
        assert_eq!(
            ClientConfig::effective_path(None),
            ClientConfig::default_path()
        );
    }

    #[test]
    fn load_for_explicit_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ClientConfig::load_for(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn load_from_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.contains("failed to read config"));
    }

    #[test]
    fn load_from_invalid_toml_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nurl = ").unwrap();
        let err = ClientConfig::load_from(file.path()).unwrap_err();
        assert!(err.contains("failed to parse config"));
    }

    #[test]
    fn flags_override_file() {
        let mut server = settings();
        server.merge(&ServerArgs {
            url: Some("https://other.example.com/dav/".to_string()),
            timeout: Some(5),
            ..Default::default()
        });

        assert_eq!(server.url.as_deref(), Some("https://other.example.com/dav/"));
        assert_eq!(server.username.as_deref(), Some("alice"));
        assert_eq!(server.timeout, 5);
    }

    #[test]
    fn credentials_from_settings() {
        let creds = settings().credentials().unwrap();
        assert_eq!(creds.server_url.as_str(), "https://dav.example.com/");
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "secret");
    }

    #[test]
    fn credentials_resolve_env_password() {
        unsafe {
            std::env::set_var("_DAVBRIDGE_CONFIG_TEST_PW", "from-env");
        }
        let mut server = settings();
        server.password = Some("env::_DAVBRIDGE_CONFIG_TEST_PW".to_string());
        assert_eq!(server.credentials().unwrap().password, "from-env");
        unsafe {
            std::env::remove_var("_DAVBRIDGE_CONFIG_TEST_PW");
        }
    }

    #[test]
    fn credentials_missing_url_errors() {
        let mut server = settings();
        server.url = None;
        assert!(server.credentials().unwrap_err().contains("server URL not set"));
    }

    #[test]
    fn credentials_invalid_url_errors() {
        let mut server = settings();
        server.url = Some("not a url".to_string());
        assert!(server.credentials().unwrap_err().contains("invalid server URL"));
    }

    #[test]
    fn redacted_masks_literal_password() {
        let config = ClientConfig {
            server: settings(),
            ..Default::default()
        };
        assert_eq!(
            config.redacted().server.password.as_deref(),
            Some("********")
        );

        let mut referenced = config.clone();
        referenced.server.password = Some("pass::dav/alice".to_string());
        assert_eq!(
            referenced.redacted().server.password.as_deref(),
            Some("pass::dav/alice")
        );
    }
}
