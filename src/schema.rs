//! Schema checks that must pass before a table is partitioned or altered.
//!
//! MySQL only range-partitions a table on a column that every PRIMARY and
//! UNIQUE key includes. The check runs on every run; a table whose keys
//! were changed since the last run is caught before any DDL reaches it.

use std::fmt;

use crate::db::{DbError, PartitionStore};

/// Outcome of checking one table.
#[derive(Debug)]
pub enum SchemaVerdict {
    Compatible,
    Incompatible(String),
    /// The catalog could not be read. Treated as incompatible.
    Unverified(DbError),
}

impl SchemaVerdict {
    pub fn is_compatible(&self) -> bool {
        matches!(self, SchemaVerdict::Compatible)
    }
}

impl fmt::Display for SchemaVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaVerdict::Compatible => f.write_str("compatible"),
            SchemaVerdict::Incompatible(reason) => write!(f, "incompatible: {reason}"),
            SchemaVerdict::Unverified(e) => write!(f, "schema could not be verified: {e}"),
        }
    }
}

/// Check that `table` can be range-partitioned on `column`.
pub async fn validate(store: &mut dyn PartitionStore, table: &str, column: &str) -> SchemaVerdict {
    match inspect(store, table, column).await {
        Ok(None) => SchemaVerdict::Compatible,
        Ok(Some(reason)) => SchemaVerdict::Incompatible(reason),
        Err(e) => SchemaVerdict::Unverified(e),
    }
}

pub async fn is_compatible(store: &mut dyn PartitionStore, table: &str, column: &str) -> bool {
    validate(store, table, column).await.is_compatible()
}

/// Returns the reason the table is unusable, if any.
async fn inspect(
    store: &mut dyn PartitionStore,
    table: &str,
    column: &str,
) -> Result<Option<String>, DbError> {
    if !store.table_exists(table).await? {
        return Ok(Some(format!("table '{table}' does not exist")));
    }
    if !store.column_exists(table, column).await? {
        return Ok(Some(format!("table '{table}' has no column '{column}'")));
    }

    let keys = store.unique_keys(table).await?;
    if let Some(key) = keys.iter().find(|k| !k.contains(column)) {
        let kind = if key.is_primary() {
            "PRIMARY KEY".to_string()
        } else {
            format!("UNIQUE KEY '{}'", key.name)
        };
        return Ok(Some(format!(
            "{kind} ({}) does not include '{column}'",
            key.columns.join(", ")
        )));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{MemoryStore, MemoryTable};

    fn store_with(table: MemoryTable) -> MemoryStore {
        MemoryStore::new().with_table("history", table)
    }

    #[tokio::test]
    async fn test_primary_key_with_clock_is_compatible() {
        let mut store = store_with(
            MemoryTable::new(&["itemid", "clock", "value", "ns"])
                .with_primary_key(&["itemid", "clock", "ns"]),
        );
        let verdict = validate(&mut store, "history", "clock").await;
        assert!(verdict.is_compatible(), "{verdict}");
    }

    #[tokio::test]
    async fn test_table_without_keys_is_compatible() {
        let mut store = store_with(MemoryTable::new(&["itemid", "clock", "value"]));
        assert!(is_compatible(&mut store, "history", "clock").await);
    }

    #[tokio::test]
    async fn test_primary_key_without_clock_is_incompatible() {
        let mut store = store_with(
            MemoryTable::new(&["id", "itemid", "clock"]).with_primary_key(&["id"]),
        );
        let verdict = validate(&mut store, "history", "clock").await;
        let SchemaVerdict::Incompatible(reason) = verdict else {
            panic!("expected incompatible, got {verdict}");
        };
        assert!(reason.contains("PRIMARY KEY (id)"));
    }

    #[tokio::test]
    async fn test_unique_key_without_clock_is_incompatible() {
        let mut store = store_with(
            MemoryTable::new(&["itemid", "clock", "ns"])
                .with_primary_key(&["itemid", "clock"])
                .with_unique_key("history_uniq", &["itemid", "ns"]),
        );
        let verdict = validate(&mut store, "history", "clock").await;
        assert!(
            matches!(verdict, SchemaVerdict::Incompatible(reason) if reason.contains("history_uniq"))
        );
    }

    #[tokio::test]
    async fn test_missing_table_and_column() {
        let mut store = store_with(MemoryTable::new(&["itemid", "ts"]));
        assert!(matches!(
            validate(&mut store, "trends", "clock").await,
            SchemaVerdict::Incompatible(reason) if reason.contains("does not exist")
        ));
        assert!(matches!(
            validate(&mut store, "history", "clock").await,
            SchemaVerdict::Incompatible(reason) if reason.contains("no column 'clock'")
        ));
    }

    #[tokio::test]
    async fn test_unreadable_catalog_fails_closed() {
        let mut store = store_with(
            MemoryTable::new(&["itemid", "clock"]).with_primary_key(&["itemid", "clock"]),
        );
        store.disconnect();

        let verdict = validate(&mut store, "history", "clock").await;
        assert!(!verdict.is_compatible());
        assert!(matches!(verdict, SchemaVerdict::Unverified(e) if e.is_connectivity()));
    }
}
