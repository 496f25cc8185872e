//! Live partition state of a table, read fresh for every decision.

use chrono::{DateTime, Utc};

use crate::db::{DbError, DbResult, PartitionStore};

/// A partition as it exists in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionRecord {
    pub name: String,
    /// Exclusive upper bound.
    pub upper: DateTime<Utc>,
}

/// The partitions of one table, ascending by boundary.
///
/// Empty when the table is not partitioned. A `MAXVALUE` partition has no
/// instant and is left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionSet {
    records: Vec<PartitionRecord>,
}

impl PartitionSet {
    pub fn new(mut records: Vec<PartitionRecord>) -> Self {
        records.sort_by_key(|r| r.upper);
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PartitionRecord> {
        self.records.iter()
    }

    pub fn highest_boundary(&self) -> Option<DateTime<Utc>> {
        self.records.last().map(|r| r.upper)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.name == name)
    }

    /// Partitions whose boundary lies after `now`.
    pub fn future_boundaries(&self, now: DateTime<Utc>) -> impl Iterator<Item = &PartitionRecord> {
        self.records.iter().filter(move |r| r.upper > now)
    }
}

impl<'a> IntoIterator for &'a PartitionSet {
    type Item = &'a PartitionRecord;
    type IntoIter = std::slice::Iter<'a, PartitionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Read the partitions of `table` from the server catalog.
pub async fn list_partitions(
    store: &mut dyn PartitionStore,
    table: &str,
) -> DbResult<PartitionSet> {
    let rows = store.partition_rows(table).await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        // An unpartitioned table reports one row with no name.
        let Some(name) = row.name else {
            continue;
        };
        let description = row.description.unwrap_or_default();
        if description.eq_ignore_ascii_case("MAXVALUE") {
            tracing::debug!(table = %table, partition = %name, "Ignoring MAXVALUE partition");
            continue;
        }
        let upper = parse_boundary(&description).ok_or_else(|| {
            DbError::InvalidCatalog(format!(
                "partition {name} of {table} has non-epoch boundary '{description}'"
            ))
        })?;
        records.push(PartitionRecord { name, upper });
    }

    Ok(PartitionSet::new(records))
}

fn parse_boundary(description: &str) -> Option<DateTime<Utc>> {
    let epoch: i64 = description.trim().parse().ok()?;
    DateTime::from_timestamp(epoch, 0)
}
