//! Configuration for the partition manager.
//!
//! Configured via a TOML file, with support for environment variable
//! interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! premake = 10
//! initial_partitioning_start = "retention"
//!
//! [database]
//! host = "db.internal"
//! user = "zabbix"
//! password = "${DB_PASSWORD}"
//! name = "zabbix"
//!
//! [[tables]]
//! name = "history"
//! period = "daily"
//! retention = "14d"
//!
//! [[tables]]
//! name = "trends"
//! period = "monthly"
//! retention = "365d"
//! ```

mod database;
mod observability;
mod tables;

use std::{collections::HashSet, path::Path, sync::LazyLock};

pub use database::*;
pub use observability::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
pub use tables::*;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/zabbix/zabbix_partitioning.toml";

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_$]{1,64}$").expect("identifier pattern is valid"));

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartitioningConfig {
    /// Database connection settings.
    pub database: DatabaseConfig,

    /// Partitions kept ahead of time, counting the one holding "now".
    /// Tables may override it.
    #[serde(default = "default_premake")]
    pub premake: u32,

    /// Write partition DDL to the binary log so replicas apply it too.
    /// Default: false (`sql_log_bin = 0` for the session).
    #[serde(default)]
    pub replicate_sql: bool,

    /// Anchor for the first layout of an unpartitioned table.
    #[serde(default)]
    pub initial_partitioning_start: InitStrategy,

    /// Column holding the row timestamp as Unix epoch seconds.
    #[serde(default = "default_partition_column")]
    pub partition_column: String,

    /// Managed tables, processed in this order.
    #[serde(default)]
    pub tables: Vec<TableConfig>,

    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_premake() -> u32 {
    10
}

fn default_partition_column() -> String {
    "clock".to_string()
}

impl PartitioningConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: PartitioningConfig = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;

        if !IDENTIFIER.is_match(&self.partition_column) {
            return Err(ConfigError::Validation(format!(
                "partition_column '{}' is not a valid column name",
                self.partition_column
            )));
        }
        if !(1..=MAX_PREMAKE).contains(&self.premake) {
            return Err(ConfigError::Validation(format!(
                "premake must be between 1 and {MAX_PREMAKE}, got {}",
                self.premake
            )));
        }

        let mut seen = HashSet::new();
        for table in &self.tables {
            if !IDENTIFIER.is_match(&table.name) {
                return Err(ConfigError::Validation(format!(
                    "'{}' is not a valid table name",
                    table.name
                )));
            }
            if !seen.insert(table.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "table '{}' is configured more than once",
                    table.name
                )));
            }
            if let Some(premake) = table.premake
                && !(1..=MAX_PREMAKE).contains(&premake)
            {
                return Err(ConfigError::Validation(format!(
                    "table '{}': premake must be between 1 and {MAX_PREMAKE}, got {premake}",
                    table.name
                )));
            }
        }

        Ok(())
    }

    /// Tables to manage, in configuration order, with defaults applied.
    pub fn targets(&self) -> Vec<TableTarget> {
        self.tables
            .iter()
            .map(|t| TableTarget {
                name: t.name.clone(),
                period: t.period,
                retention: t.retention,
                premake: t.premake.unwrap_or(self.premake),
            })
            .collect()
    }

    /// Resolve one configured table by name.
    pub fn target(&self, name: &str) -> Result<TableTarget, ConfigError> {
        self.targets()
            .into_iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ConfigError::UnknownTable(name.to_string()))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Table '{0}' is not configured")]
    UnknownTable(String),
}

/// Expand `${VAR}` references, leaving anything after a `#` comment alone.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');
        let mut last_end = 0;

        for cap in ENV_VAR.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };
            if comment_pos.is_some_and(|pos| whole.start() >= pos) {
                continue;
            }

            result.push_str(&line[last_end..whole.start()]);
            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            result.push_str(&value);
            last_end = whole.end();
        }

        result.push_str(&line[last_end..]);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}
