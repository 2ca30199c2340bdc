//! Public facade.

use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::error::CoreResult;
use crate::session::{ScopedSession, ScopedSessionManager, SessionFactory};
use crate::statement;
use crate::types::CallerId;
use sanesql_driver::{Connector, Credentials, QueryResult, SqliteConnector, UpdateResult, Value};
use std::sync::Arc;
use tracing::warn;

/// The main SaneSQL handle.
///
/// `SaneSql` ties together one [`ConnectionManager`] and one
/// [`ScopedSessionManager`]:
/// - `query` / `update` / `update_raw` run directly on the shared connection
/// - `scoped()` returns the calling thread's [`ScopedSession`] for work that
///   has to share a transaction across nested calls
///
/// # Example
///
/// ```rust
/// use sanesql_core::SaneSql;
/// use sanesql_driver::params;
///
/// let sql = SaneSql::open_sqlite(":memory:");
/// sql.update_raw("CREATE TABLE homes (owner TEXT, x INTEGER)", &[]).unwrap();
///
/// sql.transaction(|session| {
///     session.update("INSERT INTO homes VALUES (?1, ?2)", params!["alex", 10])?;
///     session.update("INSERT INTO homes VALUES (?1, ?2)", params!["sam", -4])?;
///     Ok(())
/// })
/// .unwrap();
///
/// let rows = sql.query("SELECT owner FROM homes ORDER BY x", &[]).unwrap();
/// assert_eq!(rows.len(), 2);
/// ```
pub struct SaneSql {
    config: Config,
    connections: Arc<ConnectionManager>,
    sessions: ScopedSessionManager,
}

impl SaneSql {
    /// Creates a facade. No connection is opened until one is needed.
    pub fn new(connector: Arc<dyn Connector>, credentials: Credentials, config: Config) -> Self {
        let connections = Arc::new(ConnectionManager::new(
            connector,
            credentials,
            config.probe_timeout,
        ));

        let source = Arc::clone(&connections);
        let factory: SessionFactory =
            Box::new(move || Ok(ScopedSession::new(source.get_connection()?)));
        let sessions = ScopedSessionManager::new(factory, config.lock_timeout);

        Self {
            config,
            connections,
            sessions,
        }
    }

    /// Creates a facade over a SQLite database at `path` with default
    /// configuration. `:memory:` gives a private in-memory database.
    pub fn open_sqlite(path: impl Into<String>) -> Self {
        Self::new(
            Arc::new(SqliteConnector::new()),
            Credentials::sqlite(path),
            Config::default(),
        )
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the connection manager.
    #[must_use]
    pub fn connection_manager(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Returns the session registry.
    #[must_use]
    pub fn session_manager(&self) -> &ScopedSessionManager {
        &self.sessions
    }

    /// Runs a query with positional parameters.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Connection`](crate::CoreError::Connection) if no
    /// connection can be opened, or
    /// [`CoreError::Statement`](crate::CoreError::Statement) if the query fails.
    pub fn query(&self, sql: &str, params: &[Value]) -> CoreResult<QueryResult> {
        let conn = self.connections.get_connection()?;
        statement::query(conn.as_ref(), sql, params)
    }

    /// Runs an INSERT, UPDATE or DELETE and returns the affected row count
    /// and generated keys.
    ///
    /// # Errors
    ///
    /// Same as [`query`](Self::query).
    pub fn update(&self, sql: &str, params: &[Value]) -> CoreResult<UpdateResult> {
        let conn = self.connections.get_connection()?;
        statement::update(conn.as_ref(), sql, params)
    }

    /// Runs an update and returns only the affected row count.
    ///
    /// # Errors
    ///
    /// Same as [`query`](Self::query).
    pub fn update_raw(&self, sql: &str, params: &[Value]) -> CoreResult<u64> {
        let conn = self.connections.get_connection()?;
        statement::update_raw(conn.as_ref(), sql, params)
    }

    /// Returns the calling thread's session.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LockTimeout`](crate::CoreError::LockTimeout) if
    /// the registry is contended, or a connection error if a new session
    /// needs a connection that cannot be opened.
    pub fn scoped(&self) -> CoreResult<Arc<ScopedSession>> {
        self.sessions.scoped()
    }

    /// Returns the session registered for `caller`.
    ///
    /// # Errors
    ///
    /// Same as [`scoped`](Self::scoped).
    pub fn scoped_for(&self, caller: CallerId) -> CoreResult<Arc<ScopedSession>> {
        self.sessions.scoped_for(caller)
    }

    /// Runs `f` inside the calling thread's scoped transaction.
    ///
    /// Nested calls on the same thread share one transaction. When `f`
    /// succeeds, the transaction is committed if this is the outermost call
    /// and `f` has not already committed it.
    /// When `f` fails in the outermost call, the transaction is rolled back
    /// and the session closed. A failure in a nested call leaves the decision
    /// to the outer call, which commits the whole transaction if it returns
    /// `Ok` anyway.
    ///
    /// # Errors
    ///
    /// Returns `f`'s error, or the error from joining, committing or releasing
    /// the session.
    pub fn transaction<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&ScopedSession) -> CoreResult<T>,
    {
        let session = self.scoped()?;
        let guard = session.enter_tx()?;
        let scope: &ScopedSession = &guard;

        match f(scope) {
            Ok(value) => {
                guard.commit_if_last_and_changed()?;
                guard.close()?;
                Ok(value)
            }
            Err(err) => {
                if guard.ref_count() <= 1 {
                    if let Err(rollback_err) = guard.rollback_and_close() {
                        warn!(error = %rollback_err, "rollback after failed transaction body failed");
                    }
                }
                guard.close()?;
                Err(err)
            }
        }
    }

    /// Replaces the physical connection. Sessions created before the call keep
    /// the old connection and fail on their next statement.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Connection`](crate::CoreError::Connection) if the
    /// new connection cannot be opened.
    pub fn force_reconnect(&self) -> CoreResult<()> {
        self.connections.force_reconnect().map(|_| ())
    }

    /// Returns true if the connection is open and answers a liveness probe.
    #[must_use]
    pub fn has_active_connection(&self) -> bool {
        self.connections.has_active_connection()
    }

    /// Drops registry entries for sessions that have closed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LockTimeout`](crate::CoreError::LockTimeout) if
    /// the registry is contended.
    pub fn purge_closed_sessions(&self) -> CoreResult<usize> {
        self.sessions.purge_closed()
    }

    /// Closes the physical connection. Errors are logged and dropped.
    pub fn close(&self) {
        self.connections.close();
    }
}

impl std::fmt::Debug for SaneSql {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaneSql")
            .field("config", &self.config)
            .field("connections", &self.connections)
            .finish_non_exhaustive()
    }
}
