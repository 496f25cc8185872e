use serde::{Deserialize, Serialize};

use super::ConfigError;

/// MySQL / MariaDB connection settings.
///
/// Connects over TCP to `host:port` unless `socket` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Unix socket path. Takes precedence over host/port.
    #[serde(default)]
    pub socket: Option<String>,

    pub user: String,

    #[serde(default)]
    pub password: Option<String>,

    /// Database (schema) holding the partitioned tables.
    pub name: String,

    /// TLS settings. Omit to let the server decide.
    #[serde(default)]
    pub ssl: Option<SslConfig>,

    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Session `wait_timeout` applied once after connecting.
    /// Exhaustive-scan initialization of a large table can take hours.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user.is_empty() {
            return Err(ConfigError::Validation("database.user cannot be empty".into()));
        }
        if self.name.is_empty() {
            return Err(ConfigError::Validation("database.name cannot be empty".into()));
        }
        if self.socket.is_none() && self.host.is_empty() {
            return Err(ConfigError::Validation(
                "database.host cannot be empty when no socket is configured".into(),
            ));
        }
        if self.wait_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "database.wait_timeout_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Client TLS material. Paths are read by the driver at connect time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SslConfig {
    /// CA certificate; when set the server certificate is verified.
    #[serde(default)]
    pub ca: Option<String>,
    #[serde(default)]
    pub cert: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_wait_timeout() -> u64 {
    86_400 // 24 hours
}
