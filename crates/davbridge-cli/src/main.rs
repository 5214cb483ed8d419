//! davbridge CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

use davbridge_caldav::CalDavService;
use davbridge_cli::cli::{Cli, Command, ConfigAction};
use davbridge_cli::commands;
use davbridge_cli::config::ClientConfig;
use davbridge_cli::error::{ClientError, ClientResult};
use davbridge_core::{Credentials, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path = ClientConfig::effective_path(cli.config.as_deref());
    let mut config = ClientConfig::load_for(cli.config.as_deref()).map_err(ClientError::Config)?;
    config.server.merge(&cli.server);

    if let Err(e) = init_tracing(config.tracing_config(cli.debug)) {
        eprintln!("warning: failed to initialize logging: {}", e);
    }
    debug!(config = %config_path.display(), "Configuration loaded");

    let output = match cli.command {
        Command::Config { action } => {
            return match action {
                ConfigAction::Dump => commands::config::dump(&config, &config_path),
                ConfigAction::Validate => commands::config::validate(&config),
                ConfigAction::Path => commands::config::path(&config_path),
            };
        }
        Command::Calendars => {
            let (service, credentials) = connect(&config)?;
            commands::caldav::calendars(&service, &credentials).await?
        }
        Command::Events {
            calendar,
            start,
            end,
        } => {
            let (service, credentials) = connect(&config)?;
            commands::caldav::events(&service, &credentials, &calendar, &start, &end).await?
        }
        Command::Create(args) => {
            let (service, credentials) = connect(&config)?;
            commands::caldav::create(&service, &credentials, &args).await?
        }
    };

    println!("{}", output);
    Ok(())
}

fn connect(config: &ClientConfig) -> ClientResult<(CalDavService, Credentials)> {
    let credentials = config.server.credentials().map_err(ClientError::Config)?;
    debug!(server = %credentials.redacted_server_url(), "Using server");
    Ok((
        CalDavService::http(config.server.transport_config()),
        credentials,
    ))
}
