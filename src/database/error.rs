use thiserror::Error;

/// Errors from the pool registry and the persistence backends.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database pool '{0}' is not configured")]
    ConfigMissing(String),

    #[error("Invalid database URL for pool '{0}'")]
    InvalidDatabaseUrl(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("{0} statement requires {1}")]
    UnboundedStatement(&'static str, &'static str),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    /// True when the failure is a missing or malformed deployment setting
    /// rather than a runtime database fault.
    pub fn is_configuration(&self) -> bool {
        matches!(self, DatabaseError::ConfigMissing(_) | DatabaseError::InvalidDatabaseUrl(_))
    }
}
