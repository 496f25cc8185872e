//! MySQL partition DDL rendering.
//!
//! Boundaries are written as integer epoch seconds, matching a partition
//! column that stores Unix time (e.g. Zabbix `clock`).

use super::PartitionDef;

/// Quote an identifier with backticks, doubling embedded backticks.
pub fn quote_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

fn partition_clause(partition: &PartitionDef) -> String {
    format!(
        "PARTITION {} VALUES LESS THAN ({}) ENGINE = InnoDB",
        quote_ident(&partition.name),
        partition.upper.timestamp()
    )
}

pub fn add_partition(table: &str, partition: &PartitionDef) -> String {
    format!(
        "ALTER TABLE {} ADD PARTITION ({})",
        quote_ident(table),
        partition_clause(partition)
    )
}

pub fn drop_partition(table: &str, name: &str) -> String {
    format!(
        "ALTER TABLE {} DROP PARTITION {}",
        quote_ident(table),
        quote_ident(name)
    )
}

pub fn partition_by_range(table: &str, column: &str, partitions: &[PartitionDef]) -> String {
    let clauses = partitions
        .iter()
        .map(partition_clause)
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "ALTER TABLE {} PARTITION BY RANGE ({}) (\n{}\n)",
        quote_ident(table),
        quote_ident(column),
        clauses
    )
}
