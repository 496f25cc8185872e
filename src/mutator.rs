//! The only place partition DDL is issued from.
//!
//! Under dry-run every operation renders and logs its statement, then
//! returns without touching the database.

use crate::db::{DbResult, PartitionDef, PartitionStore, ddl};

/// A partition statement and whether it reached the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedDdl {
    pub statement: String,
    pub executed: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionMutator {
    dry_run: bool,
}

impl PartitionMutator {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Add `partition` above the table's current highest boundary.
    ///
    /// The caller must have checked that the name is not already taken.
    pub async fn create_partition(
        &self,
        store: &mut dyn PartitionStore,
        table: &str,
        partition: &PartitionDef,
    ) -> DbResult<AppliedDdl> {
        let statement = ddl::add_partition(table, partition);
        if self.dry_run {
            tracing::info!(
                table = %table,
                partition = %partition.name,
                upper = %partition.upper,
                "DRY RUN: Would create partition: {}",
                statement
            );
            return Ok(self.skipped(statement));
        }

        store.add_partition(table, partition).await?;
        tracing::info!(
            table = %table,
            partition = %partition.name,
            upper = %partition.upper,
            "Created partition"
        );
        Ok(self.executed(statement))
    }

    pub async fn drop_partition(
        &self,
        store: &mut dyn PartitionStore,
        table: &str,
        name: &str,
    ) -> DbResult<AppliedDdl> {
        let statement = ddl::drop_partition(table, name);
        if self.dry_run {
            tracing::info!(
                table = %table,
                partition = %name,
                "DRY RUN: Would drop partition: {}",
                statement
            );
            return Ok(self.skipped(statement));
        }

        store.drop_partition(table, name).await?;
        tracing::info!(table = %table, partition = %name, "Dropped partition");
        Ok(self.executed(statement))
    }

    /// Convert an unpartitioned table to the given layout in one statement.
    pub async fn initialize(
        &self,
        store: &mut dyn PartitionStore,
        table: &str,
        column: &str,
        partitions: &[PartitionDef],
    ) -> DbResult<AppliedDdl> {
        let statement = ddl::partition_by_range(table, column, partitions);
        if self.dry_run {
            tracing::info!(
                table = %table,
                partitions = partitions.len(),
                "DRY RUN: Would initialize partitioning: {}",
                statement
            );
            return Ok(self.skipped(statement));
        }

        tracing::info!(
            table = %table,
            partitions = partitions.len(),
            "Initializing partitioning; this rewrites the whole table"
        );
        store.partition_by_range(table, column, partitions).await?;
        tracing::info!(table = %table, partitions = partitions.len(), "Initialized partitioning");
        Ok(self.executed(statement))
    }

    fn skipped(&self, statement: String) -> AppliedDdl {
        AppliedDdl {
            statement,
            executed: false,
        }
    }

    fn executed(&self, statement: String) -> AppliedDdl {
        AppliedDdl {
            statement,
            executed: true,
        }
    }
}
