//! Outcome of one invocation, entry by entry.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Drop,
    /// Nothing to do; the partition is already in the desired state.
    Skip,
    Error,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Create => "create",
            Action::Drop => "drop",
            Action::Skip => "skip",
            Action::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub table: String,
    pub action: Action,
    pub partition: Option<String>,
    pub dry_run: bool,
    /// DDL statement for mutations, reason for skips and errors.
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub entries: Vec<ReportEntry>,
    /// Set when the run stopped early, e.g. on a lost connection.
    pub aborted: Option<String>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and log it.
    pub fn record(&mut self, entry: ReportEntry) {
        match entry.action {
            Action::Error => tracing::error!(
                table = %entry.table,
                partition = entry.partition.as_deref().unwrap_or("-"),
                dry_run = entry.dry_run,
                detail = entry.detail.as_deref().unwrap_or(""),
                "Partition maintenance error"
            ),
            Action::Skip => tracing::debug!(
                table = %entry.table,
                partition = entry.partition.as_deref().unwrap_or("-"),
                detail = entry.detail.as_deref().unwrap_or(""),
                "Already satisfied"
            ),
            Action::Create | Action::Drop => tracing::debug!(
                table = %entry.table,
                action = %entry.action,
                partition = entry.partition.as_deref().unwrap_or("-"),
                dry_run = entry.dry_run,
                "Recorded partition change"
            ),
        }
        self.entries.push(entry);
    }

    /// Record an error against a table, optionally naming a partition.
    pub fn error(
        &mut self,
        table: &str,
        partition: Option<&str>,
        dry_run: bool,
        detail: impl fmt::Display,
    ) {
        self.record(ReportEntry {
            table: table.to_string(),
            action: Action::Error,
            partition: partition.map(str::to_string),
            dry_run,
            detail: Some(detail.to_string()),
        });
    }

    pub fn abort(&mut self, reason: impl fmt::Display) {
        let reason = reason.to_string();
        tracing::error!(reason = %reason, "Run aborted");
        self.aborted = Some(reason);
    }

    pub fn count(&self, action: Action) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }

    /// Entries that change something (create or drop).
    pub fn changes(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.action, Action::Create | Action::Drop))
    }

    pub fn entries_for<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a ReportEntry> {
        self.entries.iter().filter(move |e| e.table == table)
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.action == Action::Error)
    }

    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && !self.has_errors()
    }

    pub fn log_summary(&self, dry_run: bool) {
        let dry_run_msg = if dry_run { " (DRY RUN)" } else { "" };
        let created = self.count(Action::Create);
        let dropped = self.count(Action::Drop);
        let skipped = self.count(Action::Skip);
        let errors = self.count(Action::Error);

        if self.is_success() {
            tracing::info!(
                created,
                dropped,
                skipped,
                dry_run,
                "Partitioning completed successfully{}",
                dry_run_msg
            );
        } else {
            tracing::error!(
                created,
                dropped,
                skipped,
                errors,
                aborted = self.aborted.as_deref().unwrap_or(""),
                dry_run,
                "Partitioning finished with errors{}",
                dry_run_msg
            );
        }
    }
}
