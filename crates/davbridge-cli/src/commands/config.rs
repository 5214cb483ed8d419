//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dump the current configuration to stdout, with literal passwords masked.
pub fn dump(config: &ClientConfig, source: &Path) -> ClientResult<()> {
    println!("{}", render(config, source)?);
    Ok(())
}

/// Renders the effective configuration, headed by the file it came from.
fn render(config: &ClientConfig, source: &Path) -> ClientResult<String> {
    let toml_str = toml::to_string_pretty(&config.redacted())
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    Ok(format!("# config.toml ({})\n{}", source.display(), toml_str))
}

/// Validate the configuration.
///
/// Checks that the server settings yield usable credentials, resolving the
/// password reference, without contacting the server.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    if config.server.timeout == 0 {
        return Err(ClientError::Config(
            "server timeout must be at least 1 second".to_string(),
        ));
    }

    let credentials = config.server.credentials().map_err(ClientError::Config)?;
    println!(
        "Server {} as {}.",
        credentials.redacted_server_url(),
        credentials.username
    );

    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path(source: &Path) -> ClientResult<()> {
    println!("config: {}", source.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerSettings;

    #[test]
    fn render_names_the_loaded_file() {
        let source = Path::new("/srv/davbridge/team.toml");
        let config = ClientConfig {
            server: ServerSettings {
                password: Some("hunter2".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let out = render(&config, source).unwrap();
        assert!(out.starts_with("# config.toml (/srv/davbridge/team.toml)\n"));
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn validate_rejects_incomplete_settings() {
        let err = validate(&ClientConfig::default()).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let config = ClientConfig {
            server: ServerSettings {
                timeout: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate(&config).unwrap_err().to_string().contains("timeout"));
    }

    #[test]
    fn validate_accepts_complete_settings() {
        let config = ClientConfig {
            server: ServerSettings {
                url: Some("https://dav.example.com/".to_string()),
                username: Some("alice".to_string()),
                password: Some("secret".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate(&config).is_ok());
    }
}
