use serde::{Deserialize, Serialize};

use crate::period::{PeriodUnit, RetentionPeriod};

/// Upper bound for `premake`, globally and per table.
pub const MAX_PREMAKE: u32 = 10_000;

/// One `[[tables]]` entry.
///
/// ```toml
/// [[tables]]
/// name = "history"
/// period = "daily"
/// retention = "14d"
/// premake = 7  # optional, overrides the global value
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    pub name: String,
    pub period: PeriodUnit,
    pub retention: RetentionPeriod,
    #[serde(default)]
    pub premake: Option<u32>,
}

/// A configured table with every setting resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    pub name: String,
    pub period: PeriodUnit,
    pub retention: RetentionPeriod,
    /// Partitions kept ahead, counting the one holding "now".
    pub premake: u32,
}

/// How the first partition layout of an unpartitioned table is anchored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitStrategy {
    /// Scan the table for its oldest row and partition from there.
    /// Accurate, but the scan cost grows with the table.
    #[default]
    DbMin,
    /// Partition from `now - retention`, sweeping older rows into one
    /// catch-all partition. No scan.
    Retention,
}
