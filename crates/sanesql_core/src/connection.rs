//! Ownership of the single physical connection.

use crate::error::{CoreError, CoreResult};
use parking_lot::Mutex;
use sanesql_driver::{Connection, Connector, Credentials};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Owns at most one open physical connection and lends it out.
///
/// The connection is opened lazily by [`get_connection`](Self::get_connection)
/// and replaced when it has been closed. Sessions borrow the connection;
/// only the manager closes or reconnects it.
///
/// Callers that hold on to a connection across a
/// [`force_reconnect`](Self::force_reconnect) keep a reference to the old,
/// closed connection and fail on their next statement.
pub struct ConnectionManager {
    credentials: Credentials,
    connector: Arc<dyn Connector>,
    probe_timeout: Duration,
    current: Mutex<Option<Arc<dyn Connection>>>,
}

impl ConnectionManager {
    /// Creates a manager. No connection is opened until one is requested.
    pub fn new(
        connector: Arc<dyn Connector>,
        credentials: Credentials,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            credentials,
            connector,
            probe_timeout,
            current: Mutex::new(None),
        }
    }

    /// Returns the credentials used for every connect call.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns the current connection, opening a new one if there is none or
    /// the current one has been closed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Connection`] if the connect call fails.
    pub fn get_connection(&self) -> CoreResult<Arc<dyn Connection>> {
        let mut current = self.current.lock();
        if let Some(conn) = current.as_ref() {
            if !conn.is_closed() {
                return Ok(Arc::clone(conn));
            }
            debug!(database = %self.credentials.database, "current connection closed; reopening");
        }

        let conn = self.open()?;
        *current = Some(Arc::clone(&conn));
        Ok(conn)
    }

    /// Closes the current connection, ignoring close errors, and opens a new one.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Connection`] if the connect call fails. The old
    /// connection is closed either way.
    pub fn force_reconnect(&self) -> CoreResult<Arc<dyn Connection>> {
        let mut current = self.current.lock();
        if let Some(old) = current.take() {
            self.close_quietly(old.as_ref());
        }

        debug!(database = %self.credentials.database, "forcing reconnect");
        let conn = self.open()?;
        *current = Some(Arc::clone(&conn));
        Ok(conn)
    }

    /// Returns true if a connection exists, is open, and answers a liveness
    /// probe within the configured timeout.
    ///
    /// Returns false without blocking past the timeout if another thread
    /// holds the manager while connecting or reconnecting.
    #[must_use]
    pub fn has_active_connection(&self) -> bool {
        let Some(current) = self.current.try_lock_for(self.probe_timeout) else {
            debug!(database = %self.credentials.database, "connection busy; reporting inactive");
            return false;
        };
        let conn = current.clone();
        drop(current);
        conn.is_some_and(|conn| !conn.is_closed() && conn.is_valid(self.probe_timeout))
    }

    /// Closes the current connection. Close errors are logged and dropped.
    pub fn close(&self) {
        if let Some(conn) = self.current.lock().take() {
            self.close_quietly(conn.as_ref());
        }
    }

    fn open(&self) -> CoreResult<Arc<dyn Connection>> {
        let conn = self
            .connector
            .connect(&self.credentials)
            .map_err(CoreError::Connection)?;
        debug!(database = %self.credentials.database, "connected");
        Ok(conn)
    }

    fn close_quietly(&self, conn: &dyn Connection) {
        if let Err(err) = conn.close() {
            error!(
                database = %self.credentials.database,
                error = %err,
                "error while closing connection"
            );
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("credentials", &self.credentials)
            .field("connected", &self.current.lock().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sanesql_driver::{DriverError, DriverResult, MockConnector};
    use std::thread;
    use std::time::Instant;

    #[derive(Debug)]
    struct SlowConnector {
        inner: MockConnector,
        delay: Duration,
    }

    impl Connector for SlowConnector {
        fn connect(&self, credentials: &Credentials) -> DriverResult<Arc<dyn Connection>> {
            thread::sleep(self.delay);
            self.inner.connect(credentials)
        }
    }

    fn create_manager() -> (Arc<MockConnector>, ConnectionManager) {
        let connector = Arc::new(MockConnector::new());
        let manager = ConnectionManager::new(
            Arc::clone(&connector) as Arc<dyn Connector>,
            Credentials::new("localhost", "game", "plugin", "secret"),
            Duration::from_millis(100),
        );
        (connector, manager)
    }

    #[test]
    fn connection_is_opened_lazily() {
        let (connector, manager) = create_manager();
        assert_eq!(connector.connect_count(), 0);
        assert!(!manager.has_active_connection());

        manager.get_connection().unwrap();
        assert_eq!(connector.connect_count(), 1);
        assert!(manager.has_active_connection());
    }

    #[test]
    fn open_connection_is_reused() {
        let (connector, manager) = create_manager();
        let first = manager.get_connection().unwrap();
        let second = manager.get_connection().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connect_count(), 1);
    }

    #[test]
    fn closed_connection_is_replaced() {
        let (connector, manager) = create_manager();
        let first = manager.get_connection().unwrap();
        first.close().unwrap();

        let second = manager.get_connection().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connect_count(), 2);
    }

    #[test]
    fn connect_failure_is_connection_error() {
        let (connector, manager) = create_manager();
        connector.refuse_connections(true);

        let err = manager.get_connection().unwrap_err();
        assert!(matches!(err, CoreError::Connection(DriverError::Connect { .. })));
    }

    #[test]
    fn force_reconnect_invalidates_old_connection() {
        let (connector, manager) = create_manager();
        let stale = manager.get_connection().unwrap();

        let fresh = manager.force_reconnect().unwrap();
        assert!(stale.is_closed());
        assert!(!fresh.is_closed());
        assert!(matches!(stale.query("SELECT 1", &[]), Err(DriverError::Closed)));
        assert_eq!(connector.connect_count(), 2);
        assert!(Arc::ptr_eq(&fresh, &manager.get_connection().unwrap()));
    }

    #[test]
    fn force_reconnect_without_connection_opens_one() {
        let (connector, manager) = create_manager();
        manager.force_reconnect().unwrap();
        assert_eq!(connector.connect_count(), 1);
    }

    #[test]
    fn failed_liveness_check_means_no_active_connection() {
        let (connector, manager) = create_manager();
        manager.get_connection().unwrap();
        connector.last_connection().unwrap().set_healthy(false);

        assert!(!manager.has_active_connection());
    }

    #[test]
    fn close_releases_connection() {
        let (connector, manager) = create_manager();
        manager.get_connection().unwrap();
        manager.close();
        manager.close();

        assert!(!manager.has_active_connection());
        assert_eq!(connector.last_connection().unwrap().stats().closes, 1);
    }

    #[test]
    fn liveness_check_does_not_wait_for_slow_connect() {
        let connector = Arc::new(SlowConnector {
            inner: MockConnector::new(),
            delay: Duration::from_millis(800),
        });
        let manager = ConnectionManager::new(
            connector as Arc<dyn Connector>,
            Credentials::default(),
            Duration::from_millis(50),
        );

        thread::scope(|scope| {
            let opener = scope.spawn(|| manager.get_connection());
            thread::sleep(Duration::from_millis(100));

            let started = Instant::now();
            assert!(!manager.has_active_connection());
            assert!(started.elapsed() < Duration::from_millis(500));

            opener.join().unwrap().unwrap();
        });
        assert!(manager.has_active_connection());
    }
}
