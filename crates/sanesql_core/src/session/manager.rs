//! Per-caller session registry.

use crate::error::{CoreError, CoreResult};
use crate::session::ScopedSession;
use crate::types::CallerId;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Builds a fresh session when a caller has none or its old one has closed.
pub type SessionFactory = Box<dyn Fn() -> CoreResult<ScopedSession> + Send + Sync>;

/// Hands every caller its own [`ScopedSession`].
///
/// Sessions are keyed by [`CallerId`]. A caller keeps getting the same
/// session until it closes, after which the next lookup builds a new one.
/// All lookups go through a lock with a bounded wait.
///
/// Keying by caller only decides which session a caller gets. Sessions
/// created for different callers still borrow the same physical connection,
/// and nothing here serializes statements from different threads against it.
pub struct ScopedSessionManager {
    factory: SessionFactory,
    sessions: Mutex<HashMap<CallerId, Arc<ScopedSession>>>,
    lock_timeout: Duration,
}

impl ScopedSessionManager {
    /// Creates a registry that builds sessions with `factory`.
    pub fn new(factory: SessionFactory, lock_timeout: Duration) -> Self {
        Self {
            factory,
            sessions: Mutex::new(HashMap::new()),
            lock_timeout,
        }
    }

    /// Returns the calling thread's session.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LockTimeout`] if the registry lock is not acquired
    /// in time, or the factory's error if a new session cannot be built.
    pub fn scoped(&self) -> CoreResult<Arc<ScopedSession>> {
        self.scoped_for(CallerId::current())
    }

    /// Returns the session registered for `caller`, replacing it if it no
    /// longer accepts references.
    ///
    /// The returned session accepts further references at the moment of
    /// return.
    ///
    /// # Errors
    ///
    /// Same as [`scoped`](Self::scoped).
    pub fn scoped_for(&self, caller: CallerId) -> CoreResult<Arc<ScopedSession>> {
        let mut sessions = self.lock()?;

        if let Some(session) = sessions.get(&caller) {
            if session.accepts_further_references() {
                return Ok(Arc::clone(session));
            }
            debug!(%caller, session = %session.id(), "replacing closed session");
        }

        let session = Arc::new((self.factory)()?);
        debug!(%caller, session = %session.id(), "session registered");
        sessions.insert(caller, Arc::clone(&session));
        Ok(session)
    }

    /// Drops registry entries whose sessions have closed and returns how many
    /// were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LockTimeout`] if the registry lock is not acquired
    /// in time.
    pub fn purge_closed(&self) -> CoreResult<usize> {
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|_, session| session.accepts_further_references());
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, "purged closed sessions");
        }
        Ok(removed)
    }

    /// Returns the number of callers with a registry entry.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LockTimeout`] if the registry lock is not acquired
    /// in time.
    pub fn tracked_callers(&self) -> CoreResult<usize> {
        Ok(self.lock()?.len())
    }

    fn lock(&self) -> CoreResult<MutexGuard<'_, HashMap<CallerId, Arc<ScopedSession>>>> {
        self.sessions
            .try_lock_for(self.lock_timeout)
            .ok_or(CoreError::LockTimeout {
                waited: self.lock_timeout,
            })
    }
}

impl std::fmt::Debug for ScopedSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedSessionManager")
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sanesql_driver::{Connector, Credentials, MockConnector};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn create_manager() -> (Arc<AtomicUsize>, ScopedSessionManager) {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let connector = MockConnector::new();
        let conn = connector.connect(&Credentials::default()).unwrap();
        let factory: SessionFactory = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(ScopedSession::new(Arc::clone(&conn)))
        });
        (
            created,
            ScopedSessionManager::new(factory, Duration::from_millis(200)),
        )
    }

    #[test]
    fn same_caller_gets_same_session() {
        let (created, manager) = create_manager();
        let first = manager.scoped_for(CallerId::task(1)).unwrap();
        let second = manager.scoped_for(CallerId::task(1)).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn closed_session_is_replaced() {
        let (created, manager) = create_manager();
        let first = manager.scoped_for(CallerId::task(1)).unwrap();
        first.join().unwrap();
        first.close().unwrap();

        let second = manager.scoped_for(CallerId::task(1)).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(second.accepts_further_references());
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn open_session_is_reused_while_joined() {
        let (_, manager) = create_manager();
        let outer = manager.scoped_for(CallerId::task(1)).unwrap();
        outer.tx().unwrap();

        let inner = manager.scoped_for(CallerId::task(1)).unwrap();
        inner.tx().unwrap();
        assert!(Arc::ptr_eq(&outer, &inner));
        assert_eq!(outer.ref_count(), 2);
    }

    #[test]
    fn different_callers_get_different_sessions() {
        let (created, manager) = create_manager();
        let a = manager.scoped_for(CallerId::task(1)).unwrap();
        let b = manager.scoped_for(CallerId::task(2)).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(created.load(Ordering::SeqCst), 2);
        assert_eq!(manager.tracked_callers().unwrap(), 2);
    }

    #[test]
    fn threads_are_keyed_separately() {
        let (_, manager) = create_manager();
        let manager = Arc::new(manager);
        let here = manager.scoped().unwrap();

        let remote = Arc::clone(&manager);
        let there = thread::spawn(move || remote.scoped().unwrap())
            .join()
            .unwrap();

        assert!(!Arc::ptr_eq(&here, &there));
        assert!(Arc::ptr_eq(&here, &manager.scoped().unwrap()));
    }

    #[test]
    fn factory_error_is_propagated() {
        let factory: SessionFactory = Box::new(|| Err(CoreError::SessionClosed));
        let manager = ScopedSessionManager::new(factory, Duration::from_millis(50));

        assert!(matches!(
            manager.scoped_for(CallerId::task(1)),
            Err(CoreError::SessionClosed)
        ));
        assert_eq!(manager.tracked_callers().unwrap(), 0);
    }

    #[test]
    fn held_lock_times_out() {
        let (_, manager) = create_manager();
        let _held = manager.sessions.lock();

        let err = thread::scope(|s| {
            s.spawn(|| manager.scoped_for(CallerId::task(1)).unwrap_err())
                .join()
                .unwrap()
        });
        assert!(matches!(err, CoreError::LockTimeout { .. }));
    }

    #[test]
    fn purge_removes_only_closed_sessions() {
        let (_, manager) = create_manager();
        let closed = manager.scoped_for(CallerId::task(1)).unwrap();
        closed.join().unwrap();
        closed.close().unwrap();
        let _open = manager.scoped_for(CallerId::task(2)).unwrap();

        assert_eq!(manager.purge_closed().unwrap(), 1);
        assert_eq!(manager.tracked_callers().unwrap(), 1);
        assert_eq!(manager.purge_closed().unwrap(), 0);
    }
}
