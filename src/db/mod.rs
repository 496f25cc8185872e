pub mod ddl;
mod error;
#[cfg(test)]
pub mod memory;
pub mod mysql;
mod store;

#[cfg(test)]
mod tests;

pub use error::{DbError, DbResult};
pub use mysql::{MySqlSession, with_session};
pub use store::*;

/// Log server and schema versions at the start of a run.
///
/// A missing or unreadable `dbversion` table is not an error; the tool works
/// on any MySQL schema.
pub async fn preflight(store: &mut dyn PartitionStore) -> DbResult<()> {
    let version = store.server_version().await?;
    tracing::info!(version = %version, "Database server version");

    match store.schema_version().await {
        Ok(Some(mandatory)) => {
            tracing::info!(mandatory = %mandatory, "Zabbix database schema version")
        }
        Ok(None) => {
            tracing::warn!("No 'dbversion' table found; is this a Zabbix database?")
        }
        Err(e) if e.is_connectivity() => return Err(e),
        Err(e) => tracing::warn!(error = %e, "Could not read 'dbversion'"),
    }
    Ok(())
}
