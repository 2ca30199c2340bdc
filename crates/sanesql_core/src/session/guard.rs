//! Scope guard that releases a session reference exactly once.

use crate::error::CoreResult;
use crate::session::ScopedSession;
use std::ops::Deref;
use std::sync::Arc;
use tracing::error;

/// Holds one reference on a [`ScopedSession`] and releases it when closed
/// or dropped.
///
/// Prefer [`close`](Self::close) at the end of the happy path so that a
/// [`ForcedRollback`](crate::CoreError::ForcedRollback) reaches the caller.
/// When the guard is dropped instead (early return, `?`, panic), the release
/// still happens and any error is logged.
///
/// # Example
///
/// ```rust
/// use sanesql_core::SaneSql;
///
/// let sql = SaneSql::open_sqlite(":memory:");
/// let session = sql.scoped().unwrap();
///
/// let tx = session.enter_tx().unwrap();
/// tx.update("CREATE TABLE t (v INTEGER)", &[]).unwrap();
/// tx.commit_if_last().unwrap();
/// tx.close().unwrap();
///
/// assert!(session.is_closed());
/// ```
#[must_use = "dropping the guard releases the session reference immediately"]
pub struct SessionGuard {
    session: Arc<ScopedSession>,
    released: bool,
}

impl SessionGuard {
    pub(crate) fn new(session: Arc<ScopedSession>) -> Self {
        Self {
            session,
            released: false,
        }
    }

    /// Returns the guarded session.
    #[must_use]
    pub fn session(&self) -> &Arc<ScopedSession> {
        &self.session
    }

    /// Releases the reference and returns the result of the release.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ForcedRollback`](crate::CoreError::ForcedRollback)
    /// if this was the last reference and a transaction was still open.
    pub fn close(mut self) -> CoreResult<()> {
        self.released = true;
        self.session.close()
    }
}

impl Deref for SessionGuard {
    type Target = ScopedSession;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.session.close() {
            error!(session = %self.session.id(), error = %err, "session guard release failed");
        }
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("session", &self.session)
            .field("released", &self.released)
            .finish()
    }
}
