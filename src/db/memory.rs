//! In-memory [`PartitionStore`] enforcing MySQL's range-partition rules.
//!
//! Used to exercise the engine without a server: DDL that MySQL would reject
//! (duplicate names, non-increasing boundaries, dropping the last partition)
//! is rejected here too, and every DDL call is recorded in order.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use super::{
    PartitionDef, PartitionRow, PartitionStore, TableStats, UniqueKey,
    error::{DbError, DbResult},
};

#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    columns: Vec<String>,
    keys: Vec<UniqueKey>,
    partitions: Option<Vec<PartitionDef>>,
    min_value: Option<i64>,
    stats: TableStats,
}

impl MemoryTable {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_primary_key(self, columns: &[&str]) -> Self {
        self.with_unique_key("PRIMARY", columns)
    }

    pub fn with_unique_key(mut self, name: &str, columns: &[&str]) -> Self {
        self.keys.push(UniqueKey {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn with_partitions(mut self, partitions: Vec<PartitionDef>) -> Self {
        self.partitions = Some(partitions);
        self
    }

    /// Oldest stored value of the partition column, as epoch seconds.
    pub fn with_min_value(mut self, min_value: i64) -> Self {
        self.min_value = Some(min_value);
        self
    }

    pub fn with_stats(mut self, size_bytes: u64, rows: u64) -> Self {
        self.stats = TableStats { size_bytes, rows };
        self
    }
}

/// A DDL call received by the store, accepted or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Add { table: String, partition: String },
    Drop { table: String, partition: String },
    PartitionByRange { table: String, partitions: Vec<String> },
}

impl Mutation {
    pub fn table(&self) -> &str {
        match self {
            Mutation::Add { table, .. }
            | Mutation::Drop { table, .. }
            | Mutation::PartitionByRange { table, .. } => table,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, MemoryTable>,
    mutations: Vec<Mutation>,
    rejected: BTreeSet<String>,
    disconnected: bool,
    schema_version: Option<String>,
    min_value_scans: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: &str, table: MemoryTable) -> Self {
        self.tables.insert(name.to_string(), table);
        self
    }

    pub fn with_schema_version(mut self, version: &str) -> Self {
        self.schema_version = Some(version.to_string());
        self
    }

    /// Make any DDL naming `partition` fail as if the server refused it.
    pub fn reject_partition(&mut self, partition: &str) {
        self.rejected.insert(partition.to_string());
    }

    /// Make every subsequent call fail with a connectivity error.
    pub fn disconnect(&mut self) {
        self.disconnected = true;
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn mutations_for(&self, table: &str) -> Vec<&Mutation> {
        self.mutations.iter().filter(|m| m.table() == table).collect()
    }

    /// Live partitions of a table; empty when it is not partitioned.
    pub fn partitions(&self, table: &str) -> Vec<PartitionDef> {
        self.tables
            .get(table)
            .and_then(|t| t.partitions.clone())
            .unwrap_or_default()
    }

    /// How many full-table `MIN()` scans were requested.
    pub fn min_value_scans(&self) -> usize {
        self.min_value_scans
    }

    fn ensure_connected(&self) -> DbResult<()> {
        if self.disconnected {
            return Err(DbError::Connection("Lost connection to server".into()));
        }
        Ok(())
    }

    fn table(&self, table: &str) -> DbResult<&MemoryTable> {
        self.tables
            .get(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))
    }

    fn table_mut(&mut self, table: &str) -> DbResult<&mut MemoryTable> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| DbError::TableNotFound(table.to_string()))
    }

    fn check_rejected(&self, partition: &str) -> DbResult<()> {
        if self.rejected.contains(partition) {
            return Err(DbError::Rejected(format!(
                "Lock wait timeout exceeded altering partition {partition}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PartitionStore for MemoryStore {
    async fn server_version(&mut self) -> DbResult<String> {
        self.ensure_connected()?;
        Ok("8.0.0-memory".to_string())
    }

    async fn schema_version(&mut self) -> DbResult<Option<String>> {
        self.ensure_connected()?;
        Ok(self.schema_version.clone())
    }

    async fn table_exists(&mut self, table: &str) -> DbResult<bool> {
        self.ensure_connected()?;
        Ok(self.tables.contains_key(table))
    }

    async fn column_exists(&mut self, table: &str, column: &str) -> DbResult<bool> {
        self.ensure_connected()?;
        Ok(self
            .tables
            .get(table)
            .is_some_and(|t| t.columns.iter().any(|c| c.eq_ignore_ascii_case(column))))
    }

    async fn unique_keys(&mut self, table: &str) -> DbResult<Vec<UniqueKey>> {
        self.ensure_connected()?;
        Ok(self.table(table)?.keys.clone())
    }

    async fn partition_rows(&mut self, table: &str) -> DbResult<Vec<PartitionRow>> {
        self.ensure_connected()?;
        let rows = match &self.table(table)?.partitions {
            None => vec![PartitionRow {
                name: None,
                description: None,
            }],
            Some(partitions) => partitions
                .iter()
                .map(|p| PartitionRow {
                    name: Some(p.name.clone()),
                    description: Some(p.upper.timestamp().to_string()),
                })
                .collect(),
        };
        Ok(rows)
    }

    async fn min_value(&mut self, table: &str, _column: &str) -> DbResult<Option<i64>> {
        self.ensure_connected()?;
        let min = self.table(table)?.min_value;
        self.min_value_scans += 1;
        Ok(min)
    }

    async fn table_stats(&mut self, table: &str) -> DbResult<TableStats> {
        self.ensure_connected()?;
        Ok(self.table(table)?.stats)
    }

    async fn add_partition(&mut self, table: &str, partition: &PartitionDef) -> DbResult<()> {
        self.ensure_connected()?;
        self.mutations.push(Mutation::Add {
            table: table.to_string(),
            partition: partition.name.clone(),
        });
        self.check_rejected(&partition.name)?;

        let existing = self
            .table_mut(table)?
            .partitions
            .as_mut()
            .ok_or_else(|| {
                DbError::Rejected(
                    "Partition management on a not partitioned table is not possible".into(),
                )
            })?;
        if existing.iter().any(|p| p.name == partition.name) {
            return Err(DbError::Rejected(format!("Duplicate partition name {}", partition.name)));
        }
        if existing.last().is_some_and(|p| p.upper >= partition.upper) {
            return Err(DbError::Rejected(
                "VALUES LESS THAN value must be strictly increasing for each partition".into(),
            ));
        }
        existing.push(partition.clone());
        Ok(())
    }

    async fn drop_partition(&mut self, table: &str, name: &str) -> DbResult<()> {
        self.ensure_connected()?;
        self.mutations.push(Mutation::Drop {
            table: table.to_string(),
            partition: name.to_string(),
        });
        self.check_rejected(name)?;

        let existing = self
            .table_mut(table)?
            .partitions
            .as_mut()
            .ok_or_else(|| {
                DbError::Rejected(
                    "Partition management on a not partitioned table is not possible".into(),
                )
            })?;
        let index = existing
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| {
                DbError::Rejected(format!("Error in list of partitions to DROP: {name}"))
            })?;
        if existing.len() == 1 {
            return Err(DbError::Rejected(
                "Cannot remove all partitions, use DROP TABLE instead".into(),
            ));
        }
        existing.remove(index);
        Ok(())
    }

    async fn partition_by_range(
        &mut self,
        table: &str,
        column: &str,
        partitions: &[PartitionDef],
    ) -> DbResult<()> {
        self.ensure_connected()?;
        self.mutations.push(Mutation::PartitionByRange {
            table: table.to_string(),
            partitions: partitions.iter().map(|p| p.name.clone()).collect(),
        });
        for partition in partitions {
            self.check_rejected(&partition.name)?;
        }

        let target = self.table_mut(table)?;
        if !target.columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
            return Err(DbError::Rejected(format!("Unknown column '{column}'")));
        }
        if target.keys.iter().any(|k| !k.contains(column)) {
            return Err(DbError::Rejected(
                "A PRIMARY KEY must include all columns in the table's partitioning function".into(),
            ));
        }
        if partitions.is_empty()
            || partitions.windows(2).any(|w| w[0].upper >= w[1].upper)
        {
            return Err(DbError::Rejected(
                "VALUES LESS THAN value must be strictly increasing for each partition".into(),
            ));
        }
        let names: BTreeSet<_> = partitions.iter().map(|p| p.name.as_str()).collect();
        if names.len() != partitions.len() {
            return Err(DbError::Rejected("Duplicate partition name".into()));
        }
        if let (Some(min), Some(last)) = (target.min_value, partitions.last())
            && min >= last.upper.timestamp()
        {
            return Err(DbError::Rejected(format!(
                "Table has no partition for value {min}"
            )));
        }
        target.partitions = Some(partitions.to_vec());
        Ok(())
    }
}
