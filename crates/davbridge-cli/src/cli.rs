//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// davbridge - CalDAV calendars from the command line
#[derive(Debug, Parser)]
#[command(name = "davbridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, env = "DAVBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(flatten)]
    pub server: ServerArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Connection flags, overriding the `[server]` table of the config file.
#[derive(Debug, Default, Args)]
pub struct ServerArgs {
    /// CalDAV server URL
    #[arg(long, global = true, env = "DAVBRIDGE_URL")]
    pub url: Option<String>,

    /// Username for basic authentication
    #[arg(long, global = true, env = "DAVBRIDGE_USERNAME")]
    pub username: Option<String>,

    /// Password (supports `env::VAR` and `pass::path` references)
    #[arg(long, global = true, env = "DAVBRIDGE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List calendars
    Calendars,

    /// List the events of a calendar within a time window
    Events {
        /// Calendar display name
        #[arg(long)]
        calendar: String,

        /// Window start (ISO 8601)
        #[arg(long)]
        start: String,

        /// Window end (ISO 8601)
        #[arg(long)]
        end: String,
    },

    /// Create an event
    Create(CreateArgs),

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments of `davbridge create`.
#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Calendar display name
    #[arg(long)]
    pub calendar: String,

    /// Event title
    #[arg(long)]
    pub summary: String,

    /// Event description
    #[arg(long)]
    pub description: Option<String>,

    /// Event location
    #[arg(long)]
    pub location: Option<String>,

    /// Start instant (ISO 8601)
    #[arg(long)]
    pub start: String,

    /// End instant (ISO 8601)
    #[arg(long)]
    pub end: String,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_events_command() {
        let cli = Cli::try_parse_from([
            "davbridge",
            "events",
            "--calendar",
            "Work",
            "--start",
            "2025-01-01T00:00:00Z",
            "--end",
            "2025-01-02T00:00:00Z",
            "--url",
            "https://dav.example.com/",
        ])
        .unwrap();

        assert_eq!(cli.server.url.as_deref(), Some("https://dav.example.com/"));
        match cli.command {
            Command::Events { calendar, .. } => assert_eq!(calendar, "Work"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn parse_create_optional_fields() {
        let cli = Cli::try_parse_from([
            "davbridge",
            "create",
            "--calendar",
            "Work",
            "--summary",
            "Lunch",
            "--start",
            "2025-01-01T12:00:00Z",
            "--end",
            "2025-01-01T13:00:00Z",
        ])
        .unwrap();

        match cli.command {
            Command::Create(args) => {
                assert_eq!(args.summary, "Lunch");
                assert!(args.description.is_none());
                assert!(args.location.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn create_requires_summary() {
        let result = Cli::try_parse_from([
            "davbridge",
            "create",
            "--calendar",
            "Work",
            "--start",
            "2025-01-01T12:00:00Z",
            "--end",
            "2025-01-01T13:00:00Z",
        ]);
        assert!(result.is_err());
    }
}
