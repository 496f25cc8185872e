//! Read-only views for monitoring agents: discovery, statistics and the
//! days-left check. Nothing here issues DDL.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    catalog::{self, PartitionSet},
    config::TableTarget,
    db::{DbResult, PartitionStore},
};

/// One Zabbix low-level discovery row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryEntry {
    #[serde(rename = "{#TABLE}")]
    pub table: String,
    #[serde(rename = "{#PERIOD}")]
    pub period: String,
}

/// Configured tables as discovery rows, in configuration order.
pub fn discovery(targets: &[TableTarget]) -> Vec<DiscoveryEntry> {
    targets
        .iter()
        .map(|t| DiscoveryEntry {
            table: t.name.clone(),
            period: t.period.as_str().to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStatistics {
    pub table: String,
    pub size_bytes: u64,
    pub rows: u64,
    pub partitions: usize,
    pub days_left: i64,
}

/// Whole days until the furthest partition boundary; 0 when none lies ahead.
pub fn days_left(partitions: &PartitionSet, now: DateTime<Utc>) -> i64 {
    partitions
        .future_boundaries(now)
        .map(|r| r.upper)
        .max()
        .map(|upper| (upper - now).num_days().max(0))
        .unwrap_or(0)
}

pub async fn statistics(
    store: &mut dyn PartitionStore,
    target: &TableTarget,
    now: DateTime<Utc>,
) -> DbResult<TableStatistics> {
    let stats = store.table_stats(&target.name).await?;
    let partitions = catalog::list_partitions(store, &target.name).await?;

    Ok(TableStatistics {
        table: target.name.clone(),
        size_bytes: stats.size_bytes,
        rows: stats.rows,
        partitions: partitions.len(),
        days_left: days_left(&partitions, now),
    })
}

pub async fn check_days(
    store: &mut dyn PartitionStore,
    target: &TableTarget,
    now: DateTime<Utc>,
) -> DbResult<i64> {
    let partitions = catalog::list_partitions(store, &target.name).await?;
    Ok(days_left(&partitions, now))
}
