//! Session state machine.

use crate::error::{CoreError, CoreResult};
use crate::session::guard::SessionGuard;
use crate::statement;
use crate::types::SessionId;
use parking_lot::Mutex;
use sanesql_driver::{Connection, QueryResult, UpdateResult, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct SessionState {
    ref_count: usize,
    transaction_open: bool,
    /// Auto-commit mode captured when the current transaction was opened.
    previous_auto_commit: bool,
    /// Terminal once set.
    closed: bool,
}

/// A reference-counted transactional handle over one borrowed connection.
///
/// States, over `(ref_count, transaction_open, closed)`:
///
/// | State         | ref_count | transaction | closed |
/// |---------------|-----------|-------------|--------|
/// | Unjoined      | 0         | no          | no     |
/// | Joined        | >= 1      | no          | no     |
/// | InTransaction | >= 1      | yes         | no     |
/// | Closed        | 0         | no          | yes    |
///
/// The reference count and transaction flag live behind one lock, so each
/// transition is atomic with respect to the others. Driver calls made by
/// [`tx`](Self::tx) happen outside that lock; see its documentation.
///
/// The session never closes or reconnects its connection. That belongs to
/// the [`ConnectionManager`](crate::ConnectionManager).
pub struct ScopedSession {
    id: SessionId,
    connection: Arc<dyn Connection>,
    state: Mutex<SessionState>,
}

impl ScopedSession {
    /// Creates an unjoined session over `connection`.
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        let id = SessionId::new(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed));
        debug!(session = %id, "session created");
        Self {
            id,
            connection,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Returns the session's ID.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the borrowed connection.
    #[must_use]
    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Registers one more reference holder.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionClosed`] if the session has closed.
    pub fn join(&self) -> CoreResult<&Self> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(CoreError::SessionClosed);
        }
        state.ref_count += 1;
        trace!(session = %self.id, refs = state.ref_count, "joined");
        Ok(self)
    }

    /// Joins the session and opens a transaction if none is open.
    ///
    /// The first caller to open a transaction captures the connection's
    /// auto-commit mode and turns auto-commit off; later callers only join.
    ///
    /// The check for an open transaction and the auto-commit toggle are not
    /// one atomic step. Two threads calling `tx()` on the same session at the
    /// same moment can both toggle, and the second capture then records
    /// auto-commit as already off.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionClosed`] if the session has closed, or a
    /// driver error if auto-commit cannot be read or changed. On a driver
    /// error the reference taken by this call is released again without
    /// closing the session, so a later `tx()` can retry.
    pub fn tx(&self) -> CoreResult<&Self> {
        self.join()?;
        if self.has_transaction() {
            return Ok(self);
        }

        self.open_transaction().map(|()| self).map_err(|err| {
            self.release_reference();
            err
        })
    }

    fn release_reference(&self) {
        let mut state = self.state.lock();
        state.ref_count = state.ref_count.saturating_sub(1);
        trace!(session = %self.id, refs = state.ref_count, "released after failed transaction start");
    }

    fn open_transaction(&self) -> CoreResult<()> {
        let previous = self.connection.auto_commit()?;
        self.connection.set_auto_commit(false)?;

        let mut state = self.state.lock();
        state.previous_auto_commit = previous;
        state.transaction_open = true;
        debug!(session = %self.id, refs = state.ref_count, "transaction opened");
        Ok(())
    }

    /// Commits the open transaction and restores the captured auto-commit mode.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveTransaction`] if the session is closed or
    /// no transaction is open, or a driver error if the commit fails. A failed
    /// commit leaves the transaction open.
    pub fn commit(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        self.commit_locked(&mut state)
    }

    fn commit_locked(&self, state: &mut SessionState) -> CoreResult<()> {
        if state.closed || !state.transaction_open {
            return Err(CoreError::NoActiveTransaction);
        }
        self.connection.commit()?;
        state.transaction_open = false;
        debug!(session = %self.id, refs = state.ref_count, "transaction committed");
        self.restore_auto_commit(state)
    }

    fn restore_auto_commit(&self, state: &SessionState) -> CoreResult<()> {
        if state.previous_auto_commit {
            self.connection.set_auto_commit(true)?;
        }
        Ok(())
    }

    /// Rolls back the open transaction and closes the session, no matter how
    /// many other callers still hold references.
    ///
    /// Meant for leak recovery. Other holders see
    /// [`CoreError::SessionClosed`] on their next `join()` and a harmless
    /// no-op on their `close()`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NoActiveTransaction`] if the session is closed or
    /// no transaction is open. Driver errors from the rollback are returned
    /// after the session has been closed.
    pub fn rollback_and_close(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        if state.closed || !state.transaction_open {
            return Err(CoreError::NoActiveTransaction);
        }

        let result = self
            .connection
            .rollback()
            .map_err(CoreError::from)
            .and_then(|()| self.restore_auto_commit(&state));

        debug!(session = %self.id, refs = state.ref_count, "rolled back and closed");
        Self::mark_closed(&mut state);
        result
    }

    /// Commits if the caller holds the last (or only) reference; otherwise
    /// does nothing.
    ///
    /// # Errors
    ///
    /// Same as [`commit`](Self::commit) when this caller is last.
    pub fn commit_if_last(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        if state.ref_count > 1 {
            return Ok(());
        }
        self.commit_locked(&mut state)
    }

    /// Like [`commit_if_last`](Self::commit_if_last), but a no-op when no
    /// transaction was opened anywhere in the call chain.
    ///
    /// # Errors
    ///
    /// Same as [`commit`](Self::commit) when this caller is last and a
    /// transaction is open.
    pub fn commit_if_last_and_changed(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        if !state.transaction_open || state.ref_count > 1 {
            return Ok(());
        }
        self.commit_locked(&mut state)
    }

    /// Releases one reference.
    ///
    /// When the count reaches zero the session closes. Surplus calls are
    /// clamped at zero and succeed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ForcedRollback`] if this released the last
    /// reference while a transaction was still open. The transaction has
    /// been rolled back and the session is closed when this is returned.
    pub fn close(&self) -> CoreResult<()> {
        let mut state = self.state.lock();
        state.ref_count = state.ref_count.saturating_sub(1);
        trace!(session = %self.id, refs = state.ref_count, "released");
        if state.ref_count > 0 || state.closed {
            return Ok(());
        }

        if !state.transaction_open {
            debug!(session = %self.id, "session closed");
            Self::mark_closed(&mut state);
            return Ok(());
        }

        let rollback_error = self
            .connection
            .rollback()
            .map_err(CoreError::from)
            .and_then(|()| self.restore_auto_commit(&state))
            .err()
            .map(|err| err.to_string());
        Self::mark_closed(&mut state);

        error!(
            session = %self.id,
            rollback_error = rollback_error.as_deref().unwrap_or("none"),
            "last reference released with an open transaction; forced rollback"
        );
        Err(CoreError::ForcedRollback { rollback_error })
    }

    fn mark_closed(state: &mut SessionState) {
        state.ref_count = 0;
        state.transaction_open = false;
        state.closed = true;
    }

    /// Returns true while at least one caller holds a reference.
    #[must_use]
    pub fn has_references(&self) -> bool {
        self.state.lock().ref_count > 0
    }

    /// Returns false once the session has closed.
    #[must_use]
    pub fn accepts_further_references(&self) -> bool {
        !self.state.lock().closed
    }

    /// Returns true while a transaction is open.
    #[must_use]
    pub fn has_transaction(&self) -> bool {
        let state = self.state.lock();
        state.transaction_open && !state.closed
    }

    /// Returns the current reference count.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        self.state.lock().ref_count
    }

    /// Returns true once the session has closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Joins the session and returns a guard that releases the reference.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionClosed`] if the session has closed.
    pub fn enter(self: &Arc<Self>) -> CoreResult<SessionGuard> {
        self.join()?;
        Ok(SessionGuard::new(Arc::clone(self)))
    }

    /// Joins or opens a transaction and returns a guard that releases the
    /// reference.
    ///
    /// # Errors
    ///
    /// Same as [`tx`](Self::tx).
    pub fn enter_tx(self: &Arc<Self>) -> CoreResult<SessionGuard> {
        self.tx()?;
        Ok(SessionGuard::new(Arc::clone(self)))
    }

    /// Runs a query on the session's connection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionClosed`] if the session has closed, or the
    /// statement's error.
    pub fn query(&self, sql: &str, params: &[Value]) -> CoreResult<QueryResult> {
        self.ensure_open()?;
        statement::query(self.connection.as_ref(), sql, params)
    }

    /// Runs an update on the session's connection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SessionClosed`] if the session has closed, or the
    /// statement's error.
    pub fn update(&self, sql: &str, params: &[Value]) -> CoreResult<UpdateResult> {
        self.ensure_open()?;
        statement::update(self.connection.as_ref(), sql, params)
    }

    /// Runs an update and returns only the affected row count.
    ///
    /// # Errors
    ///
    /// Same as [`update`](Self::update).
    pub fn update_raw(&self, sql: &str, params: &[Value]) -> CoreResult<u64> {
        self.ensure_open()?;
        statement::update_raw(self.connection.as_ref(), sql, params)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_closed() {
            return Err(CoreError::SessionClosed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ScopedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ScopedSession")
            .field("id", &self.id)
            .field("ref_count", &state.ref_count)
            .field("transaction_open", &state.transaction_open)
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}
