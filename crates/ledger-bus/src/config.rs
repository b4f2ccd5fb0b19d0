//! # Bus Configuration
//!
//! Loaded from TOML, then overridden from the environment.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 5300
//! password = "secret"
//! database_path = "/srv/ledger/books.h2"
//! store_type = "H2_DATABASE"
//!
//! [timeouts]
//! connect_secs = 5
//! handshake_secs = 5
//! write_secs = 5
//! ```
//!
//! Every key is optional.

use std::fs;
use std::path::Path;
use std::time::Duration;

use ledger_types::DataStoreType;
use serde::Deserialize;
use tracing::debug;

use crate::client::ClientConfig;
use crate::error::ConfigError;
use crate::server::ServerConfig;
use crate::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_PORT, DEFAULT_WRITE_TIMEOUT,
};

/// Host override.
pub const ENV_HOST: &str = "LEDGER_BUS_HOST";
/// Port override.
pub const ENV_PORT: &str = "LEDGER_BUS_PORT";
/// Password override. An empty value disables encryption.
pub const ENV_PASSWORD: &str = "LEDGER_BUS_PASSWORD";
/// Database path override.
pub const ENV_DATABASE_PATH: &str = "LEDGER_BUS_DATABASE_PATH";
/// Store type override.
pub const ENV_STORE_TYPE: &str = "LEDGER_BUS_STORE_TYPE";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    timeouts: TimeoutSection,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
    password: Option<String>,
    database_path: Option<String>,
    store_type: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TimeoutSection {
    connect_secs: Option<u64>,
    handshake_secs: Option<u64>,
    write_secs: Option<u64>,
}

/// Resolved bus settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub database_path: String,
    pub store_type: DataStoreType,
    pub connect_timeout: Duration,
    pub handshake_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            password: None,
            database_path: String::new(),
            store_type: DataStoreType::H2Database,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl BusConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "Loading bus configuration");
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns error on invalid TOML, unknown keys or an unknown store type.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        let defaults = Self::default();

        let store_type = match file.server.store_type {
            Some(name) => parse_store_type(&name)?,
            None => defaults.store_type,
        };
        let secs = |value: Option<u64>, default: Duration| value.map_or(default, Duration::from_secs);

        Ok(Self {
            host: file.server.host.unwrap_or(defaults.host),
            port: file.server.port.unwrap_or(defaults.port),
            password: file.server.password.filter(|p| !p.is_empty()),
            database_path: file.server.database_path.unwrap_or(defaults.database_path),
            store_type,
            connect_timeout: secs(file.timeouts.connect_secs, defaults.connect_timeout),
            handshake_timeout: secs(file.timeouts.handshake_secs, defaults.handshake_timeout),
            write_timeout: secs(file.timeouts.write_secs, defaults.write_timeout),
        })
    }

    /// Apply `LEDGER_BUS_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns error if an override cannot be parsed.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup, keyed by the `ENV_*` names.
    ///
    /// # Errors
    ///
    /// Returns error if an override cannot be parsed.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            self.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_PORT.to_string(),
                reason: format!("not a port number: {port}"),
            })?;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.password = Some(password).filter(|p| !p.is_empty());
        }
        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            self.database_path = path;
        }
        if let Some(name) = lookup(ENV_STORE_TYPE) {
            self.store_type = parse_store_type(&name)?;
        }
        Ok(self)
    }

    /// Ports derived from the configured base port.
    pub fn service_ports(&self) -> ServicePorts {
        ServicePorts::from_base(self.port)
    }

    /// Client settings targeting `port`.
    pub fn client_config(&self, port: u16) -> ClientConfig {
        ClientConfig {
            host: self.host.clone(),
            port,
            password: self.password.clone(),
            connect_timeout: self.connect_timeout,
            handshake_timeout: self.handshake_timeout,
            write_timeout: self.write_timeout,
        }
    }

    /// Server settings listening on `port`.
    pub fn server_config(&self, port: u16) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port,
            password: self.password.clone(),
            database_path: self.database_path.clone(),
            store_type: self.store_type,
            write_timeout: self.write_timeout,
        }
    }
}

fn parse_store_type(name: &str) -> Result<DataStoreType, ConfigError> {
    name.parse().map_err(|e: ledger_types::TypeError| ConfigError::InvalidValue {
        key: "store_type".to_string(),
        reason: e.to_string(),
    })
}

/// Ports of the services hosted alongside a shared database, offset from
/// one base port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServicePorts {
    base: u16,
}

impl ServicePorts {
    pub fn from_base(base: u16) -> Self {
        Self { base }
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    /// Message relay server.
    pub fn message_bus(&self) -> u16 {
        self.base.wrapping_add(1)
    }

    pub fn lock_manager(&self) -> u16 {
        self.base.wrapping_add(2)
    }

    pub fn attachment_transfer(&self) -> u16 {
        self.base.wrapping_add(3)
    }
}
