//! First-time partitioning of a table that already holds data.
//!
//! The whole layout is applied in one `PARTITION BY RANGE` statement, from
//! the chosen start period through the period containing now. Partitions
//! ahead of now are left to the next maintenance run.

use chrono::{DateTime, Utc};

use crate::{
    catalog::PartitionSet,
    config::{InitStrategy, TableTarget},
    db::{DbError, PartitionDef, PartitionStore},
    period::PartitionBoundary,
};

/// Catch-all partition holding every row older than the first period.
pub const ARCHIVE_PARTITION: &str = "p_archive";

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Table '{table}' already has {existing} partitions; refusing to re-initialize")]
    Conflict { table: String, existing: usize },

    #[error(transparent)]
    Db(#[from] DbError),
}

/// The layout an unpartitioned table is converted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitPlan {
    pub table: String,
    pub strategy: InitStrategy,
    /// Ascending; the catch-all, when present, comes first.
    pub partitions: Vec<PartitionDef>,
}

impl InitPlan {
    pub fn has_archive(&self) -> bool {
        self.partitions
            .first()
            .is_some_and(|p| p.name == ARCHIVE_PARTITION)
    }
}

/// A table may be (re)initialized while it has at most one partition.
pub fn check_initializable(table: &str, observed: &PartitionSet) -> Result<(), InitError> {
    if observed.len() > 1 {
        return Err(InitError::Conflict {
            table: table.to_string(),
            existing: observed.len(),
        });
    }
    Ok(())
}

/// Work out the initial layout of `target`.
///
/// `db_min` issues a full-table `MIN()` scan; `retention` touches nothing.
pub async fn plan(
    store: &mut dyn PartitionStore,
    target: &TableTarget,
    observed: &PartitionSet,
    strategy: InitStrategy,
    column: &str,
    now: DateTime<Utc>,
) -> Result<InitPlan, InitError> {
    check_initializable(&target.name, observed)?;

    let unit = target.period;
    let current = unit.boundary_containing(now);

    let (start, archive) = match strategy {
        InitStrategy::DbMin => {
            tracing::info!(
                table = %target.name,
                "Scanning for the oldest row to anchor partitioning; this may be slow"
            );
            let oldest = match store.min_value(&target.name, column).await? {
                Some(epoch) => DateTime::from_timestamp(epoch, 0).ok_or_else(|| {
                    DbError::InvalidCatalog(format!(
                        "MIN({column}) of {} is out of range: {epoch}",
                        target.name
                    ))
                })?,
                None => now,
            };
            // Rows stamped in the future still start no later than now.
            (unit.period_start(oldest.min(now)), None)
        }
        InitStrategy::Retention => {
            let start = unit.period_start(target.retention.cutoff(now));
            (start, Some(start))
        }
    };

    let mut partitions = Vec::new();
    if let Some(upper) = archive {
        partitions.push(PartitionDef {
            name: ARCHIVE_PARTITION.to_string(),
            upper,
        });
    }
    partitions.extend(unit.series(start, current.upper).into_iter().map(into_def));

    tracing::debug!(
        table = %target.name,
        strategy = ?strategy,
        start = %start,
        partitions = partitions.len(),
        "Planned initial partitioning"
    );

    Ok(InitPlan {
        table: target.name.clone(),
        strategy,
        partitions,
    })
}

fn into_def(boundary: PartitionBoundary) -> PartitionDef {
    PartitionDef {
        name: boundary.name,
        upper: boundary.upper,
    }
}
