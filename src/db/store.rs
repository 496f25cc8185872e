use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::error::DbResult;

/// A PRIMARY or UNIQUE key and its columns in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub name: String,
    pub columns: Vec<String>,
}

impl UniqueKey {
    pub fn is_primary(&self) -> bool {
        self.name == "PRIMARY"
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(column))
    }
}

/// One row of the partition catalog, as stored.
///
/// An unpartitioned table reports a single row with no name; a `MAXVALUE`
/// partition reports the literal description `MAXVALUE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRow {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// A range partition to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionDef {
    pub name: String,
    /// Exclusive upper bound (`VALUES LESS THAN`).
    pub upper: DateTime<Utc>,
}

/// Size estimates for a table as reported by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    /// Data plus index length.
    pub size_bytes: u64,
    /// Row-count estimate.
    pub rows: u64,
}

/// Everything the partition engine needs from a database session.
///
/// Methods take `&mut self`: a run owns exactly one session and issues its
/// statements one at a time.
#[async_trait]
pub trait PartitionStore: Send {
    /// Server version string, for logging.
    async fn server_version(&mut self) -> DbResult<String>;

    /// Mandatory schema version from the monitoring application's
    /// `dbversion` table, if there is one.
    async fn schema_version(&mut self) -> DbResult<Option<String>>;

    async fn table_exists(&mut self, table: &str) -> DbResult<bool>;

    async fn column_exists(&mut self, table: &str, column: &str) -> DbResult<bool>;

    /// PRIMARY and UNIQUE keys of a table.
    async fn unique_keys(&mut self, table: &str) -> DbResult<Vec<UniqueKey>>;

    /// Raw partition catalog rows in ordinal order.
    async fn partition_rows(&mut self, table: &str) -> DbResult<Vec<PartitionRow>>;

    /// Smallest value of `column` as epoch seconds; `None` for an empty table.
    ///
    /// Scans the whole table.
    async fn min_value(&mut self, table: &str, column: &str) -> DbResult<Option<i64>>;

    async fn table_stats(&mut self, table: &str) -> DbResult<TableStats>;

    // ==================== DDL ====================

    /// Add one partition above the current highest boundary.
    async fn add_partition(&mut self, table: &str, partition: &PartitionDef) -> DbResult<()>;

    async fn drop_partition(&mut self, table: &str, name: &str) -> DbResult<()>;

    /// Convert a table to range partitioning on `column` with the given layout.
    async fn partition_by_range(
        &mut self,
        table: &str,
        column: &str,
        partitions: &[PartitionDef],
    ) -> DbResult<()>;
}
