//! Custom error types for the common library
//!
//! This module defines application-specific error types that can be used
//! throughout the application.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Error occurred during database migration
    #[error("Database migration error: {0}")]
    Migration(String),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),

    /// A stored row could not be turned back into a domain value
    #[error("Database decode error: {0}")]
    Decode(String),
}

impl DatabaseError {
    /// Whether retrying the same call later could succeed.
    ///
    /// Connection failures, pool exhaustion and I/O errors are transient;
    /// constraint violations, bad SQL and decode failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            DatabaseError::Connection(_) => true,
            DatabaseError::Query(e) => matches!(
                e,
                SqlxError::PoolTimedOut
                    | SqlxError::PoolClosed
                    | SqlxError::Io(_)
                    | SqlxError::WorkerCrashed
            ),
            DatabaseError::Migration(_)
            | DatabaseError::Configuration(_)
            | DatabaseError::Decode(_) => false,
        }
    }
}

impl From<SqlxError> for DatabaseError {
    fn from(e: SqlxError) -> Self {
        DatabaseError::Query(e)
    }
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_is_transient() {
        assert!(DatabaseError::Query(SqlxError::PoolTimedOut).is_transient());
        assert!(DatabaseError::Connection(SqlxError::PoolClosed).is_transient());
    }

    #[test]
    fn test_row_not_found_is_permanent() {
        assert!(!DatabaseError::Query(SqlxError::RowNotFound).is_transient());
        assert!(!DatabaseError::Decode("bad category".to_string()).is_transient());
    }
}
