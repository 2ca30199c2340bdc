//! Recording in-memory driver for tests.

use crate::connection::{Connection, Connector};
use crate::credentials::Credentials;
use crate::error::{DriverError, DriverResult};
use crate::value::{QueryResult, UpdateResult, Value};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counters kept by a [`MockConnection`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockStats {
    /// Times auto-commit went from on to off.
    pub auto_commit_disables: usize,
    /// Times auto-commit went from off to on.
    pub auto_commit_restores: usize,
    /// Calls to `commit`.
    pub commits: usize,
    /// Calls to `rollback`.
    pub rollbacks: usize,
    /// Calls to `close`.
    pub closes: usize,
    /// SQL text of every statement, in execution order.
    pub statements: Vec<String>,
}

#[derive(Debug, Default)]
struct Scripts {
    queries: HashMap<String, QueryResult>,
    updates: HashMap<String, UpdateResult>,
}

/// Hands out [`MockConnection`]s and keeps a handle to each one.
///
/// # Example
///
/// ```rust
/// use sanesql_driver::{Connector, Credentials, MockConnector};
///
/// let connector = MockConnector::new();
/// let conn = connector.connect(&Credentials::default()).unwrap();
/// conn.set_auto_commit(false).unwrap();
/// conn.commit().unwrap();
///
/// let stats = connector.last_connection().unwrap().stats();
/// assert_eq!(stats.auto_commit_disables, 1);
/// assert_eq!(stats.commits, 1);
/// ```
#[derive(Debug, Default)]
pub struct MockConnector {
    connections: Mutex<Vec<Arc<MockConnection>>>,
    scripts: Arc<RwLock<Scripts>>,
    refuse: AtomicBool,
    next_serial: AtomicU64,
}

impl MockConnector {
    /// Creates a connector that accepts every connect call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent connect calls fail (or succeed again).
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Scripts the rows returned for `sql` on every connection.
    pub fn script_query(&self, sql: impl Into<String>, result: QueryResult) {
        self.scripts.write().queries.insert(sql.into(), result);
    }

    /// Scripts the update result returned for `sql` on every connection.
    pub fn script_update(&self, sql: impl Into<String>, result: UpdateResult) {
        self.scripts.write().updates.insert(sql.into(), result);
    }

    /// Returns the number of successful connect calls.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Returns the most recently opened connection.
    #[must_use]
    pub fn last_connection(&self) -> Option<Arc<MockConnection>> {
        self.connections.lock().last().cloned()
    }

    /// Returns every connection opened so far.
    #[must_use]
    pub fn connections(&self) -> Vec<Arc<MockConnection>> {
        self.connections.lock().clone()
    }
}

impl Connector for MockConnector {
    fn connect(&self, credentials: &Credentials) -> DriverResult<Arc<dyn Connection>> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(DriverError::connect(format!(
                "mock refused connection to {:?}",
                credentials.database
            )));
        }
        let serial = self.next_serial.fetch_add(1, Ordering::SeqCst) + 1;
        let conn = Arc::new(MockConnection::new(serial, Arc::clone(&self.scripts)));
        self.connections.lock().push(Arc::clone(&conn));
        Ok(conn)
    }
}

#[derive(Debug)]
struct MockState {
    auto_commit: bool,
    closed: bool,
    fail_next: Option<String>,
    stats: MockStats,
}

/// A connection that records what was done to it.
///
/// Statements return scripted results, or an empty result set and one
/// affected row when nothing was scripted.
#[derive(Debug)]
pub struct MockConnection {
    serial: u64,
    state: Mutex<MockState>,
    scripts: Arc<RwLock<Scripts>>,
    healthy: AtomicBool,
}

impl MockConnection {
    fn new(serial: u64, scripts: Arc<RwLock<Scripts>>) -> Self {
        Self {
            serial,
            state: Mutex::new(MockState {
                auto_commit: true,
                closed: false,
                fail_next: None,
                stats: MockStats::default(),
            }),
            scripts,
            healthy: AtomicBool::new(true),
        }
    }

    /// Returns the connection's serial number, starting at 1.
    #[must_use]
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Returns a snapshot of the recorded counters.
    #[must_use]
    pub fn stats(&self) -> MockStats {
        self.state.lock().stats.clone()
    }

    /// Makes the liveness probe fail (or pass again).
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Makes the next statement fail with a statement error.
    pub fn fail_next_statement(&self, message: impl Into<String>) {
        self.state.lock().fail_next = Some(message.into());
    }

    fn record_statement(&self, sql: &str) -> DriverResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(DriverError::Closed);
        }
        state.stats.statements.push(sql.to_string());
        match state.fail_next.take() {
            Some(message) => Err(DriverError::statement(message)),
            None => Ok(()),
        }
    }
}

impl Connection for MockConnection {
    fn query(&self, sql: &str, _params: &[Value]) -> DriverResult<QueryResult> {
        self.record_statement(sql)?;
        Ok(self
            .scripts
            .read()
            .queries
            .get(sql)
            .cloned()
            .unwrap_or_default())
    }

    fn execute(&self, sql: &str, _params: &[Value]) -> DriverResult<UpdateResult> {
        self.record_statement(sql)?;
        Ok(self
            .scripts
            .read()
            .updates
            .get(sql)
            .cloned()
            .unwrap_or_else(|| UpdateResult::affected(1)))
    }

    fn auto_commit(&self) -> DriverResult<bool> {
        let state = self.state.lock();
        if state.closed {
            return Err(DriverError::Closed);
        }
        Ok(state.auto_commit)
    }

    fn set_auto_commit(&self, enabled: bool) -> DriverResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(DriverError::Closed);
        }
        match (state.auto_commit, enabled) {
            (true, false) => state.stats.auto_commit_disables += 1,
            (false, true) => state.stats.auto_commit_restores += 1,
            _ => {}
        }
        state.auto_commit = enabled;
        Ok(())
    }

    fn commit(&self) -> DriverResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(DriverError::Closed);
        }
        state.stats.commits += 1;
        Ok(())
    }

    fn rollback(&self) -> DriverResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(DriverError::Closed);
        }
        state.stats.rollbacks += 1;
        Ok(())
    }

    fn is_valid(&self, timeout: Duration) -> bool {
        match self.state.try_lock_for(timeout) {
            Some(state) => !state.closed && self.healthy.load(Ordering::SeqCst),
            None => false,
        }
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn close(&self) -> DriverResult<()> {
        let mut state = self.state.lock();
        state.closed = true;
        state.stats.closes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(connector: &MockConnector) -> Arc<dyn Connection> {
        connector.connect(&Credentials::sqlite("mock")).unwrap()
    }

    #[test]
    fn serials_increase() {
        let connector = MockConnector::new();
        connect(&connector);
        connect(&connector);
        let serials: Vec<_> = connector.connections().iter().map(|c| c.serial()).collect();
        assert_eq!(serials, vec![1, 2]);
        assert_eq!(connector.connect_count(), 2);
    }

    #[test]
    fn refused_connect_fails() {
        let connector = MockConnector::new();
        connector.refuse_connections(true);
        let err = connector.connect(&Credentials::default()).unwrap_err();
        assert!(matches!(err, DriverError::Connect { .. }));
        assert_eq!(connector.connect_count(), 0);
    }

    #[test]
    fn auto_commit_toggles_are_counted_once_per_change() {
        let connector = MockConnector::new();
        let conn = connect(&connector);
        conn.set_auto_commit(false).unwrap();
        conn.set_auto_commit(false).unwrap();
        conn.set_auto_commit(true).unwrap();

        let stats = connector.last_connection().unwrap().stats();
        assert_eq!(stats.auto_commit_disables, 1);
        assert_eq!(stats.auto_commit_restores, 1);
    }

    #[test]
    fn scripted_results_are_returned() {
        let connector = MockConnector::new();
        connector.script_query(
            "SELECT name FROM players",
            QueryResult::from_values(vec!["name".into()], vec![vec![Value::from("alex")]]),
        );
        connector.script_update(
            "INSERT INTO players DEFAULT VALUES",
            UpdateResult {
                affected_rows: 1,
                generated_keys: vec![9],
            },
        );
        let conn = connect(&connector);

        assert_eq!(conn.query("SELECT name FROM players", &[]).unwrap().len(), 1);
        assert!(conn.query("SELECT 1", &[]).unwrap().is_empty());
        assert_eq!(
            conn.execute("INSERT INTO players DEFAULT VALUES", &[])
                .unwrap()
                .generated_keys,
            vec![9]
        );
    }

    #[test]
    fn injected_failure_applies_once() {
        let connector = MockConnector::new();
        let conn = connect(&connector);
        connector
            .last_connection()
            .unwrap()
            .fail_next_statement("duplicate key");

        let err = conn.execute("INSERT", &[]).unwrap_err();
        assert!(err.is_statement());
        assert!(conn.execute("INSERT", &[]).is_ok());
    }

    #[test]
    fn closed_connection_rejects_everything() {
        let connector = MockConnector::new();
        let conn = connect(&connector);
        conn.close().unwrap();

        assert!(conn.is_closed());
        assert!(!conn.is_valid(Duration::from_millis(10)));
        assert!(matches!(conn.commit(), Err(DriverError::Closed)));
        assert!(matches!(conn.query("SELECT 1", &[]), Err(DriverError::Closed)));
    }

    #[test]
    fn unhealthy_connection_is_not_valid() {
        let connector = MockConnector::new();
        let conn = connect(&connector);
        connector.last_connection().unwrap().set_healthy(false);
        assert!(!conn.is_valid(Duration::from_millis(10)));
        assert!(!conn.is_closed());
    }

    #[test]
    fn connection_handles_are_debuggable() {
        let connector = MockConnector::new();
        let conn = connect(&connector);
        assert!(format!("{conn:?}").contains("MockConnection"));

        let connected: DriverResult<Arc<dyn Connection>> = Ok(conn);
        assert!(connected.is_ok());
        connector.refuse_connections(true);
        let refused = connector.connect(&Credentials::default());
        assert!(matches!(refused.unwrap_err(), DriverError::Connect { .. }));
    }
}
