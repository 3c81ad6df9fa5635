use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{Config, Database, Ledger, Logging, Server, Session};

/// Prefix for environment overrides, e.g. `FOLIO__SESSION__SECRET`.
const ENV_PREFIX: &str = "FOLIO";

/// Loads the application configuration from `path`, layering `FOLIO__*`
/// environment variables on top, and validates the result.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

    build(builder)
}

fn build(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<Config, ConfigError> {
    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.build()?.try_deserialize::<Config>()?;
    config.validate()?;

    tracing::debug!(
        server = %config.server.socket_addr(),
        opening_balance = %config.ledger.opening_balance,
        "Configuration loaded."
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn from_toml(toml: &str) -> Result<Config, ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml));
        build(builder)
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = from_toml(&format!("[session]\nsecret = \"{SECRET}\"\nttl_minutes = 60\n"))
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.allowed_origins, vec!["http://localhost:3002".to_string()]);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.ledger.opening_balance, dec!(100000));
        assert!(config.logging.directory.is_none());
    }

    #[test]
    fn reads_every_section() {
        let config = from_toml(&format!(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080

            [database]
            url = "postgres://localhost/folio"
            max_connections = 4
            acquire_timeout_secs = 2

            [ledger]
            opening_balance = "2500.50"

            [session]
            secret = "{SECRET}"
            ttl_minutes = 15

            [logging]
            directory = "logs"
            "#
        ))
        .unwrap();

        assert_eq!(config.server.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.database.url.as_deref(), Some("postgres://localhost/folio"));
        assert_eq!(config.ledger.opening_balance, dec!(2500.50));
        assert_eq!(config.session.ttl_minutes, 15);
        assert_eq!(config.logging.directory.as_deref(), Some("logs"));
    }

    #[test]
    fn rejects_short_secret_and_negative_opening_balance() {
        let short = from_toml("[session]\nsecret = \"short\"\nttl_minutes = 60\n");
        assert!(matches!(short, Err(ConfigError::ValidationError(_))));

        let negative = from_toml(&format!(
            "[ledger]\nopening_balance = -1\n[session]\nsecret = \"{SECRET}\"\nttl_minutes = 60\n"
        ));
        assert!(matches!(negative, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn allowed_origins_must_be_http_urls() {
        let config = from_toml(&format!(
            "[server]\nallowed_origins = [\"https://app.example.com\"]\n[session]\nsecret = \"{SECRET}\"\nttl_minutes = 60\n"
        ))
        .unwrap();
        assert_eq!(config.server.allowed_origins, vec!["https://app.example.com".to_string()]);
        assert_eq!(config.server.port, 3000);

        let wildcard = from_toml(&format!(
            "[server]\nallowed_origins = [\"*\"]\n[session]\nsecret = \"{SECRET}\"\nttl_minutes = 60\n"
        ));
        assert!(matches!(wildcard, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn loads_from_a_file_on_disk() {
        let path = std::env::temp_dir().join(format!("folio-config-{}.toml", std::process::id()));
        std::fs::write(&path, format!("[session]\nsecret = \"{SECRET}\"\nttl_minutes = 30\n"))
            .unwrap();

        let config = load_config(&path);
        std::fs::remove_file(&path).ok();
        assert_eq!(config.unwrap().session.ttl_minutes, 30);
    }
}
