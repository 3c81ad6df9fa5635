use crate::error::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub ledger: Ledger,
    pub session: Session,
    #[serde(default)]
    pub logging: Logging,
}

/// Where the HTTP surface listens.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Server {
    pub host: IpAddr,
    pub port: u16,
    /// Browser origins allowed to call the API with the session cookie.
    pub allowed_origins: Vec<String>,
}

/// Connection pool settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    /// Falls back to the `DATABASE_URL` environment variable when unset.
    pub url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// Parameters of the simulated cash ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct Ledger {
    /// The cash balance every newly registered account starts with.
    pub opening_balance: Decimal,
}

/// Parameters for the stateless session tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    /// Key for the HMAC signature on session tokens.
    pub secret: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Logging {
    /// When set, logs are also written to a daily rolling file in this directory.
    pub directory: Option<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 3000,
            allowed_origins: vec!["http://localhost:3002".to_string()],
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            acquire_timeout_secs: 5,
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            opening_balance: dec!(100000),
        }
    }
}

impl Server {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Config {
    /// Checks the values that deserialize fine but make no sense at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ledger.opening_balance.is_sign_negative() {
            return Err(ConfigError::ValidationError(
                "ledger.opening_balance must not be negative".to_string(),
            ));
        }
        if self.session.secret.len() < 32 {
            return Err(ConfigError::ValidationError(
                "session.secret must be at least 32 bytes".to_string(),
            ));
        }
        if self.session.ttl_minutes <= 0 {
            return Err(ConfigError::ValidationError(
                "session.ttl_minutes must be greater than 0".to_string(),
            ));
        }
        if let Some(origin) = self
            .server
            .allowed_origins
            .iter()
            .find(|origin| !(origin.starts_with("http://") || origin.starts_with("https://")))
        {
            return Err(ConfigError::ValidationError(format!(
                "server.allowed_origins entries must be http(s) origins, got {origin:?}"
            )));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
