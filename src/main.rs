use std::{path::PathBuf, process::ExitCode};

use chrono::Utc;
use clap::Parser;
use zabbix_partitioning::{
    config::{DEFAULT_CONFIG_PATH, PartitioningConfig},
    db,
    maintenance::{self, RunContext, RunMode},
    monitoring, observability,
};

/// CLI arguments for the partition manager
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Time-range partition maintenance for MySQL monitoring tables",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log the statements that would run without executing them
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Create upcoming partitions and drop expired ones (default)
    Maintain,
    /// Partition configured tables that are not partitioned yet
    Init,
    /// Print configured tables as Zabbix low-level discovery JSON
    Discovery,
    /// Print size, row estimate, partition count and days left for a table
    Stats {
        /// Configured table name
        table: String,
    },
    /// Print the number of days covered by future partitions of a table
    CheckDays {
        /// Configured table name
        table: String,
    },
}

impl Command {
    /// Commands whose stdout is parsed by a monitoring agent.
    fn is_machine_readable(&self) -> bool {
        matches!(
            self,
            Command::Discovery | Command::Stats { .. } | Command::CheckDays { .. }
        )
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    let command = args.command.unwrap_or(Command::Maintain);

    let config = match PartitioningConfig::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) =
        observability::init_tracing(&config.observability.logging, command.is_machine_readable())
    {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match command {
        Command::Maintain => run_maintenance(config, RunMode::Maintain, args.dry_run).await,
        Command::Init => run_maintenance(config, RunMode::Init, args.dry_run).await,
        Command::Discovery => run_discovery(&config),
        Command::Stats { table } => run_stats(&config, &table).await,
        Command::CheckDays { table } => run_check_days(&config, &table).await,
    }
}

async fn run_maintenance(config: PartitioningConfig, mode: RunMode, dry_run: bool) -> ExitCode {
    let targets = config.targets();
    if targets.is_empty() {
        tracing::warn!("No tables configured; nothing to do");
        return ExitCode::SUCCESS;
    }

    let ctx = RunContext::from_config(&config, mode, dry_run, Utc::now());
    let result = db::with_session(&config.database, config.replicate_sql, move |session| {
        Box::pin(async move { maintenance::run(session, &ctx, &targets).await })
    })
    .await;

    match result {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "Could not open database session");
            ExitCode::FAILURE
        }
    }
}

fn run_discovery(config: &PartitioningConfig) -> ExitCode {
    match serde_json::to_string(&monitoring::discovery(&config.targets())) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize discovery data");
            ExitCode::FAILURE
        }
    }
}

async fn run_stats(config: &PartitioningConfig, table: &str) -> ExitCode {
    let target = match config.target(table) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "Cannot report statistics");
            return ExitCode::FAILURE;
        }
    };

    let now = Utc::now();
    let result = db::with_session(&config.database, config.replicate_sql, move |session| {
        Box::pin(async move { monitoring::statistics(session, &target, now).await })
    })
    .await;

    let json = match result {
        Ok(Ok(stats)) => serde_json::to_string(&stats),
        Ok(Err(e)) | Err(e) => {
            tracing::error!(table = %table, error = %e, "Failed to read table statistics");
            return ExitCode::FAILURE;
        }
    };
    match json {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize statistics");
            ExitCode::FAILURE
        }
    }
}

async fn run_check_days(config: &PartitioningConfig, table: &str) -> ExitCode {
    let target = match config.target(table) {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "Cannot check partition coverage");
            return ExitCode::FAILURE;
        }
    };

    let now = Utc::now();
    let result = db::with_session(&config.database, config.replicate_sql, move |session| {
        Box::pin(async move { monitoring::check_days(session, &target, now).await })
    })
    .await;

    match result {
        Ok(Ok(days)) => {
            println!("{days}");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) | Err(e) => {
            tracing::error!(table = %table, error = %e, "Failed to check partition coverage");
            ExitCode::FAILURE
        }
    }
}
