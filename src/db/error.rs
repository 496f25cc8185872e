use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Statement rejected: {0}")]
    Rejected(String),

    #[error("Invalid catalog data: {0}")]
    InvalidCatalog(String),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl DbError {
    /// Whether the session itself is gone, as opposed to one statement failing.
    ///
    /// Connectivity failures end the run; everything else is isolated to the
    /// table or action that caused it.
    pub fn is_connectivity(&self) -> bool {
        match self {
            DbError::Connection(_) => true,
            DbError::Sqlx(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::Protocol(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
