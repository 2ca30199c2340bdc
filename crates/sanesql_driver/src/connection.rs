//! Connection and connector traits.

use crate::credentials::Credentials;
use crate::error::DriverResult;
use crate::value::{QueryResult, UpdateResult, Value};
use std::sync::Arc;
use std::time::Duration;

/// A physical database connection.
///
/// Connections are shared behind an `Arc` and every method takes `&self`;
/// implementations serialize access internally.
///
/// # Auto-commit
///
/// With auto-commit on, every statement commits on its own. Turning it off
/// makes the next statement open a transaction that stays open until
/// [`commit`](Connection::commit) or [`rollback`](Connection::rollback); the
/// statement after that opens a new one. Turning auto-commit back on commits
/// whatever is pending.
///
/// # Invariants
///
/// - `close` is idempotent; every other operation fails after it
/// - `is_valid` never returns an error and never waits longer than `timeout`
///   for the connection itself
pub trait Connection: std::fmt::Debug + Send + Sync {
    /// Runs a query with positional parameters and returns all rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the statement fails.
    fn query(&self, sql: &str, params: &[Value]) -> DriverResult<QueryResult>;

    /// Runs an INSERT, UPDATE or DELETE with positional parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the statement fails.
    fn execute(&self, sql: &str, params: &[Value]) -> DriverResult<UpdateResult>;

    /// Returns the current auto-commit mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed.
    fn auto_commit(&self) -> DriverResult<bool>;

    /// Sets the auto-commit mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or a pending transaction
    /// cannot be committed.
    fn set_auto_commit(&self, enabled: bool) -> DriverResult<()>;

    /// Commits the current transaction, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the commit fails.
    fn commit(&self) -> DriverResult<()>;

    /// Rolls back the current transaction, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection is closed or the rollback fails.
    fn rollback(&self) -> DriverResult<()>;

    /// Probes the connection, waiting at most `timeout`.
    fn is_valid(&self, timeout: Duration) -> bool;

    /// Returns true once the connection has been closed.
    fn is_closed(&self) -> bool;

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver failed to release the connection. The
    /// connection counts as closed either way.
    fn close(&self) -> DriverResult<()>;
}

/// Opens physical connections.
pub trait Connector: Send + Sync {
    /// Opens a new connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be reached.
    fn connect(&self, credentials: &Credentials) -> DriverResult<Arc<dyn Connection>>;
}
