//! The per-run driver: validate, observe, plan, apply and report, one table
//! at a time.
//!
//! Per-table and per-action failures are recorded and the run moves on. A
//! lost connection ends the run, since nothing after it can succeed.

mod plan;

use chrono::{DateTime, Utc};
pub use plan::{MaintenancePlan, plan_table};
use tracing::Instrument;

use crate::{
    catalog::{self, PartitionSet},
    config::{InitStrategy, PartitioningConfig, TableTarget},
    db::{self, DbError, PartitionDef, PartitionStore},
    init::{self, InitError},
    mutator::PartitionMutator,
    report::{Action, ReportEntry, RunReport},
    schema::{self, SchemaVerdict},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Keep partitioned tables current; initialize unpartitioned ones.
    Maintain,
    /// Only initialize. Tables already holding partitions are rejected.
    Init,
}

/// Everything a run needs besides the store and the tables.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub now: DateTime<Utc>,
    pub dry_run: bool,
    pub mode: RunMode,
    pub init_strategy: InitStrategy,
    pub partition_column: String,
}

impl RunContext {
    pub fn from_config(
        config: &PartitioningConfig,
        mode: RunMode,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            now,
            dry_run,
            mode,
            init_strategy: config.initial_partitioning_start,
            partition_column: config.partition_column.clone(),
        }
    }

    fn mutator(&self) -> PartitionMutator {
        PartitionMutator::new(self.dry_run)
    }
}

/// Process every target in order and report what happened.
pub async fn run(
    store: &mut dyn PartitionStore,
    ctx: &RunContext,
    targets: &[TableTarget],
) -> RunReport {
    let mut report = RunReport::new();
    let dry_run_msg = if ctx.dry_run { " (DRY RUN)" } else { "" };

    tracing::info!(
        mode = ?ctx.mode,
        tables = targets.len(),
        now = %ctx.now,
        dry_run = ctx.dry_run,
        "Starting partition maintenance{}",
        dry_run_msg
    );

    if let Err(e) = db::preflight(store).await {
        report.abort(e);
        report.log_summary(ctx.dry_run);
        return report;
    }

    for target in targets {
        let span = tracing::info_span!("table", table = %target.name, period = %target.period);
        let outcome = process_table(store, ctx, target, &mut report)
            .instrument(span)
            .await;
        if let Err(e) = outcome {
            report.abort(format!("lost connection while processing '{}': {e}", target.name));
            break;
        }
    }

    report.log_summary(ctx.dry_run);
    report
}

/// Errors returned from here end the run; everything else is recorded.
async fn process_table(
    store: &mut dyn PartitionStore,
    ctx: &RunContext,
    target: &TableTarget,
    report: &mut RunReport,
) -> Result<(), DbError> {
    let table = target.name.as_str();

    match schema::validate(store, table, &ctx.partition_column).await {
        SchemaVerdict::Compatible => {}
        SchemaVerdict::Incompatible(reason) => {
            report.error(table, None, ctx.dry_run, format!("schema incompatible: {reason}"));
            return Ok(());
        }
        SchemaVerdict::Unverified(e) => {
            if e.is_connectivity() {
                return Err(e);
            }
            report.error(table, None, ctx.dry_run, format!("schema could not be verified: {e}"));
            return Ok(());
        }
    }

    let observed = match catalog::list_partitions(store, table).await {
        Ok(observed) => observed,
        Err(e) if e.is_connectivity() => return Err(e),
        Err(e) => {
            report.error(table, None, ctx.dry_run, e);
            return Ok(());
        }
    };
    tracing::debug!(partitions = observed.len(), "Observed partitions");

    if ctx.mode == RunMode::Init || observed.is_empty() {
        return initialize(store, ctx, target, &observed, report).await;
    }

    let plan = plan_table(target, &observed, ctx.now);
    if plan.is_noop() {
        tracing::info!("Partitions up to date");
    }
    apply(store, ctx, target, plan, report).await
}

async fn initialize(
    store: &mut dyn PartitionStore,
    ctx: &RunContext,
    target: &TableTarget,
    observed: &PartitionSet,
    report: &mut RunReport,
) -> Result<(), DbError> {
    let table = target.name.as_str();
    let plan = match init::plan(
        store,
        target,
        observed,
        ctx.init_strategy,
        &ctx.partition_column,
        ctx.now,
    )
    .await
    {
        Ok(plan) => plan,
        Err(InitError::Db(e)) if e.is_connectivity() => return Err(e),
        Err(e) => {
            report.error(table, None, ctx.dry_run, e);
            return Ok(());
        }
    };
    tracing::debug!(
        partitions = plan.partitions.len(),
        archive = plan.has_archive(),
        "Planned initial layout"
    );

    match ctx
        .mutator()
        .initialize(store, table, &ctx.partition_column, &plan.partitions)
        .await
    {
        Ok(applied) => {
            let detail = format!(
                "initial partitioning ({:?}){}",
                plan.strategy,
                if applied.executed { "" } else { ", not executed" }
            );
            for partition in &plan.partitions {
                report.record(ReportEntry {
                    table: table.to_string(),
                    action: Action::Create,
                    partition: Some(partition.name.clone()),
                    dry_run: ctx.dry_run,
                    detail: Some(detail.clone()),
                });
            }
            Ok(())
        }
        Err(e) if e.is_connectivity() => Err(e),
        Err(e) => {
            report.error(table, None, ctx.dry_run, format!("initialization failed: {e}"));
            Ok(())
        }
    }
}

async fn apply(
    store: &mut dyn PartitionStore,
    ctx: &RunContext,
    target: &TableTarget,
    plan: MaintenancePlan,
    report: &mut RunReport,
) -> Result<(), DbError> {
    let table = target.name.as_str();
    let mutator = ctx.mutator();

    for boundary in plan.satisfied {
        report.record(ReportEntry {
            table: table.to_string(),
            action: Action::Skip,
            partition: Some(boundary.name),
            dry_run: ctx.dry_run,
            detail: Some("already exists".into()),
        });
    }

    for boundary in plan.conflicts {
        report.error(
            table,
            Some(&boundary.name),
            ctx.dry_run,
            format!(
                "a partition named {} already exists below the boundary {}",
                boundary.name, boundary.upper
            ),
        );
    }

    for boundary in plan.creations {
        let partition = PartitionDef {
            name: boundary.name,
            upper: boundary.upper,
        };
        match mutator.create_partition(store, table, &partition).await {
            Ok(applied) => report.record(ReportEntry {
                table: table.to_string(),
                action: Action::Create,
                partition: Some(partition.name),
                dry_run: ctx.dry_run,
                detail: Some(applied.statement),
            }),
            Err(e) if e.is_connectivity() => return Err(e),
            Err(e) => report.error(table, Some(&partition.name), ctx.dry_run, e),
        }
    }

    for record in plan.drops {
        match mutator.drop_partition(store, table, &record.name).await {
            Ok(applied) => report.record(ReportEntry {
                table: table.to_string(),
                action: Action::Drop,
                partition: Some(record.name),
                dry_run: ctx.dry_run,
                detail: Some(applied.statement),
            }),
            Err(e) if e.is_connectivity() => return Err(e),
            Err(e) => report.error(table, Some(&record.name), ctx.dry_run, e),
        }
    }

    Ok(())
}
