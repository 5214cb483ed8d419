//! Logging setup for the davbridge binary.
//!
//! Logs go to stderr in the compact single-line format so JSON written to
//! stdout stays machine-readable. The level applies to the davbridge crates
//! only; `RUST_LOG` replaces the whole directive when set.
//!
//! ```ignore
//! use davbridge_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::cli_debug())?;
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    /// Failed to set global subscriber
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// Failed to parse env filter directive
    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// Configuration for tracing initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracingConfig {
    /// Level for the davbridge crates when RUST_LOG is not set
    pub level: Level,
    /// Whether to include file/line information in logs
    pub include_location: bool,
}

impl Default for TracingConfig {
    /// Warnings and errors only.
    fn default() -> Self {
        Self {
            level: Level::WARN,
            include_location: false,
        }
    }
}

impl TracingConfig {
    /// Create a config suitable for CLI usage with debug mode
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            level: Level::DEBUG,
            include_location: true,
        }
    }
}

/// Initialize tracing with the given configuration.
///
/// This should be called once at the start of the application.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set or if
/// the filter directive is invalid.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(config.level)))?;

    let layer = fmt::layer()
        .compact()
        .without_time()
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_target(true);

    let subscriber = tracing_subscriber::registry().with(env_filter).with(layer);
    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Filter directive enabling `level` for every davbridge crate.
fn default_directive(level: Level) -> String {
    CRATE_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

const CRATE_TARGETS: [&str; 3] = ["davbridge_core", "davbridge_caldav", "davbridge_cli"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.level, Level::WARN);
        assert!(!config.include_location);
    }

    #[test]
    fn test_cli_debug_config() {
        let config = TracingConfig::cli_debug();
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.include_location);
    }

    #[test]
    fn test_default_directive_covers_all_crates() {
        let directive = default_directive(Level::DEBUG);
        assert_eq!(
            directive,
            "davbridge_core=DEBUG,davbridge_caldav=DEBUG,davbridge_cli=DEBUG"
        );
        assert!(EnvFilter::try_new(directive).is_ok());
    }
}
