//! MySQL / MariaDB session backing [`PartitionStore`].
//!
//! One connection per invocation, no pool. Session settings are applied once
//! right after connecting and hold for every statement issued afterwards:
//! - `wait_timeout` is raised so a long exhaustive-scan initialization does
//!   not get the connection reaped mid-run
//! - `sql_log_bin = 0` keeps partition DDL out of the binary log unless
//!   replication was requested

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::{
    Connection, Executor, MySqlConnection,
    mysql::{MySqlConnectOptions, MySqlSslMode},
};

use super::{
    PartitionDef, PartitionRow, PartitionStore, TableStats, UniqueKey, ddl,
    error::{DbError, DbResult},
};
use crate::config::DatabaseConfig;

pub struct MySqlSession {
    conn: MySqlConnection,
}

impl MySqlSession {
    /// Connect and apply the session settings.
    pub async fn open(config: &DatabaseConfig, replicate_sql: bool) -> DbResult<Self> {
        let options = connect_options(config);
        let timeout = Duration::from_secs(config.connect_timeout_secs);

        tracing::info!(
            database = %config.name,
            host = %config.socket.as_deref().unwrap_or(&config.host),
            "Connecting to database"
        );

        let conn = tokio::time::timeout(timeout, MySqlConnection::connect_with(&options))
            .await
            .map_err(|_| {
                DbError::Connection(format!(
                    "timed out after {}s connecting to database '{}'",
                    config.connect_timeout_secs, config.name
                ))
            })?
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let mut session = Self { conn };
        session
            .execute(&format!("SET SESSION wait_timeout = {}", config.wait_timeout_secs))
            .await?;
        if !replicate_sql {
            session.execute("SET SESSION sql_log_bin = 0").await?;
        }

        Ok(session)
    }

    /// Close the connection, logging rather than returning a failure.
    pub async fn close(self) {
        match self.conn.close().await {
            Ok(()) => tracing::info!("Database connection closed"),
            Err(e) => tracing::warn!(error = %e, "Database connection did not close cleanly"),
        }
    }

    async fn execute(&mut self, sql: &str) -> DbResult<()> {
        tracing::debug!(sql = %sql, "Executing statement");
        (&mut self.conn).execute(sqlx::raw_sql(sql)).await?;
        Ok(())
    }

    async fn execute_ddl(&mut self, sql: &str) -> DbResult<()> {
        self.execute(sql).await.map_err(|e| match e {
            DbError::Sqlx(sqlx::Error::Database(db)) => DbError::Rejected(db.message().to_string()),
            other => other,
        })
    }
}

/// Open a session, run `f` against it, and close it on every path.
///
/// ```ignore
/// let report = with_session(&config.database, false, move |session| {
///     Box::pin(async move { maintenance::run(session, &ctx, &targets).await })
/// })
/// .await?;
/// ```
pub async fn with_session<T, F>(config: &DatabaseConfig, replicate_sql: bool, f: F) -> DbResult<T>
where
    F: for<'s> FnOnce(&'s mut MySqlSession) -> BoxFuture<'s, T>,
{
    let mut session = MySqlSession::open(config, replicate_sql).await?;
    let output = f(&mut session).await;
    session.close().await;
    Ok(output)
}

pub(crate) fn connect_options(config: &DatabaseConfig) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .username(&config.user)
        .database(&config.name);

    if let Some(password) = &config.password {
        options = options.password(password);
    }

    options = match &config.socket {
        Some(socket) => options.socket(socket),
        None => options.host(&config.host).port(config.port),
    };

    if let Some(ssl) = &config.ssl {
        options = options.ssl_mode(if ssl.ca.is_some() {
            MySqlSslMode::VerifyCa
        } else {
            MySqlSslMode::Required
        });
        if let Some(ca) = &ssl.ca {
            options = options.ssl_ca(ca);
        }
        if let Some(cert) = &ssl.cert {
            options = options.ssl_client_cert(cert);
        }
        if let Some(key) = &ssl.key {
            options = options.ssl_client_key(key);
        }
    }

    options
}

#[async_trait]
impl PartitionStore for MySqlSession {
    async fn server_version(&mut self) -> DbResult<String> {
        let version: String = sqlx::query_scalar("SELECT VERSION()")
            .fetch_one(&mut self.conn)
            .await?;
        Ok(version)
    }

    async fn schema_version(&mut self) -> DbResult<Option<String>> {
        if !self.table_exists("dbversion").await? {
            return Ok(None);
        }
        let version: Option<Option<String>> =
            sqlx::query_scalar("SELECT CAST(`mandatory` AS CHAR) FROM `dbversion` LIMIT 1")
                .fetch_optional(&mut self.conn)
                .await?;
        Ok(version.flatten())
    }

    async fn table_exists(&mut self, table: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            "#,
        )
        .bind(table)
        .fetch_one(&mut self.conn)
        .await?;
        Ok(count > 0)
    }

    async fn column_exists(&mut self, table: &str, column: &str) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND COLUMN_NAME = ?
            "#,
        )
        .bind(table)
        .bind(column)
        .fetch_one(&mut self.conn)
        .await?;
        Ok(count > 0)
    }

    async fn unique_keys(&mut self, table: &str) -> DbResult<Vec<UniqueKey>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT CAST(tc.CONSTRAINT_NAME AS CHAR), CAST(kcu.COLUMN_NAME AS CHAR)
            FROM information_schema.TABLE_CONSTRAINTS tc
            JOIN information_schema.KEY_COLUMN_USAGE kcu
              ON kcu.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA
             AND kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
             AND kcu.TABLE_NAME = tc.TABLE_NAME
            WHERE tc.TABLE_SCHEMA = DATABASE()
              AND tc.TABLE_NAME = ?
              AND tc.CONSTRAINT_TYPE IN ('PRIMARY KEY', 'UNIQUE')
            ORDER BY tc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION
            "#,
        )
        .bind(table)
        .fetch_all(&mut self.conn)
        .await?;

        let mut keys: Vec<UniqueKey> = Vec::new();
        for (name, column) in rows {
            if let Some(key) = keys.last_mut().filter(|key| key.name == name) {
                key.columns.push(column);
                continue;
            }
            keys.push(UniqueKey {
                name,
                columns: vec![column],
            });
        }
        Ok(keys)
    }

    async fn partition_rows(&mut self, table: &str) -> DbResult<Vec<PartitionRow>> {
        let rows: Vec<(Option<String>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT CAST(PARTITION_NAME AS CHAR), CAST(PARTITION_DESCRIPTION AS CHAR)
            FROM information_schema.PARTITIONS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            ORDER BY PARTITION_ORDINAL_POSITION
            "#,
        )
        .bind(table)
        .fetch_all(&mut self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, description)| PartitionRow { name, description })
            .collect())
    }

    async fn min_value(&mut self, table: &str, column: &str) -> DbResult<Option<i64>> {
        let sql = format!(
            "SELECT CAST(MIN({}) AS SIGNED) FROM {}",
            ddl::quote_ident(column),
            ddl::quote_ident(table)
        );
        let min: Option<i64> = sqlx::query_scalar(&sql).fetch_one(&mut self.conn).await?;
        Ok(min)
    }

    async fn table_stats(&mut self, table: &str) -> DbResult<TableStats> {
        let row: Option<(u64, u64)> = sqlx::query_as(
            r#"
            SELECT CAST(COALESCE(DATA_LENGTH, 0) + COALESCE(INDEX_LENGTH, 0) AS UNSIGNED),
                   CAST(COALESCE(TABLE_ROWS, 0) AS UNSIGNED)
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            "#,
        )
        .bind(table)
        .fetch_optional(&mut self.conn)
        .await?;

        let (size_bytes, rows) = row.ok_or_else(|| DbError::TableNotFound(table.to_string()))?;
        Ok(TableStats { size_bytes, rows })
    }

    async fn add_partition(&mut self, table: &str, partition: &PartitionDef) -> DbResult<()> {
        self.execute_ddl(&ddl::add_partition(table, partition)).await
    }

    async fn drop_partition(&mut self, table: &str, name: &str) -> DbResult<()> {
        self.execute_ddl(&ddl::drop_partition(table, name)).await
    }

    async fn partition_by_range(
        &mut self,
        table: &str,
        column: &str,
        partitions: &[PartitionDef],
    ) -> DbResult<()> {
        self.execute_ddl(&ddl::partition_by_range(table, column, partitions))
            .await
    }
}
