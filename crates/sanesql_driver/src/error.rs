//! Error types for driver operations.

use thiserror::Error;

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors that can occur while talking to a database.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The physical connection could not be established.
    #[error("connect failed: {message}")]
    Connect {
        /// Description of the failure.
        message: String,
    },

    /// The connection has been closed.
    #[error("connection is closed")]
    Closed,

    /// A statement was rejected or failed during execution.
    #[error("statement failed: {message}")]
    Statement {
        /// Description of the failure.
        message: String,
    },

    /// SQLite reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl DriverError {
    /// Creates a connect error.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    /// Creates a statement error.
    pub fn statement(message: impl Into<String>) -> Self {
        Self::Statement {
            message: message.into(),
        }
    }

    /// Returns true if this error came from the SQL itself rather than from
    /// the connection it ran on.
    ///
    /// Malformed SQL, constraint violations and type mismatches are statement
    /// errors. A closed, busy or unopenable database is not.
    #[must_use]
    pub fn is_statement(&self) -> bool {
        match self {
            Self::Statement { .. } => true,
            Self::Connect { .. } | Self::Closed => false,
            Self::Sqlite(err) => !matches!(
                err.sqlite_error_code(),
                Some(
                    rusqlite::ErrorCode::CannotOpen
                        | rusqlite::ErrorCode::DatabaseBusy
                        | rusqlite::ErrorCode::DatabaseLocked
                        | rusqlite::ErrorCode::NotADatabase
                        | rusqlite::ErrorCode::SystemIoFailure
                )
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_errors_are_classified() {
        assert!(DriverError::statement("syntax error").is_statement());
        assert!(!DriverError::connect("refused").is_statement());
        assert!(!DriverError::Closed.is_statement());
    }

    #[test]
    fn sqlite_syntax_error_is_statement() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err: DriverError = conn.execute("NOT SQL", []).unwrap_err().into();
        assert!(err.is_statement());
    }

    #[test]
    fn display_includes_message() {
        let err = DriverError::connect("host unreachable");
        assert_eq!(err.to_string(), "connect failed: host unreachable");
    }
}
