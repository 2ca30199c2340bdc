//! Error types for SaneSQL core.

use sanesql_driver::DriverError;
use std::time::Duration;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in SaneSQL core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The physical connection could not be established or used.
    #[error("connection error: {0}")]
    Connection(#[source] DriverError),

    /// A statement was malformed, violated a constraint, or failed in the driver.
    #[error("statement error: {0}")]
    Statement(#[source] DriverError),

    /// The session's lifecycle has already ended.
    #[error("session is closed")]
    SessionClosed,

    /// Commit or rollback was requested without an open transaction.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// The last reference to a session was released while a transaction was
    /// still open. The transaction was rolled back.
    #[error(
        "last session reference released with an open transaction; rolled back{}",
        rollback_suffix(.rollback_error)
    )]
    ForcedRollback {
        /// Set when the defensive rollback itself failed.
        rollback_error: Option<String>,
    },

    /// The session registry lock could not be acquired in time.
    #[error("session registry lock not acquired within {waited:?}")]
    LockTimeout {
        /// How long the caller waited.
        waited: Duration,
    },
}

fn rollback_suffix(rollback_error: &Option<String>) -> String {
    match rollback_error {
        Some(err) => format!(" (rollback failed: {err})"),
        None => String::new(),
    }
}

impl CoreError {
    /// Returns true for errors that indicate a reference-counting or
    /// transaction bug in the calling code.
    #[must_use]
    pub fn is_caller_bug(&self) -> bool {
        matches!(
            self,
            Self::SessionClosed | Self::NoActiveTransaction | Self::ForcedRollback { .. }
        )
    }
}

impl From<DriverError> for CoreError {
    fn from(err: DriverError) -> Self {
        if err.is_statement() {
            Self::Statement(err)
        } else {
            Self::Connection(err)
        }
    }
}
