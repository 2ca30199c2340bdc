//! SQLite driver backed by `rusqlite`.

use crate::connection::{Connection, Connector};
use crate::credentials::Credentials;
use crate::error::{DriverError, DriverResult};
use crate::value::{QueryResult, Row, UpdateResult, Value};
use parking_lot::Mutex;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const MEMORY_PATH: &str = ":memory:";

/// Opens SQLite connections.
///
/// `Credentials::database` is the file path, or `:memory:` for a private
/// in-memory database. The remaining credential fields are ignored.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    busy_timeout: Duration,
}

impl SqliteConnector {
    /// Creates a connector with a 5 second busy timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Sets how long statements wait on a locked database file.
    #[must_use]
    pub const fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

impl Default for SqliteConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for SqliteConnector {
    fn connect(&self, credentials: &Credentials) -> DriverResult<Arc<dyn Connection>> {
        if !credentials.host.is_empty() || !credentials.user.is_empty() {
            debug!(
                host = %credentials.host,
                user = %credentials.user,
                "sqlite ignores host and user credentials"
            );
        }

        let conn = if credentials.database == MEMORY_PATH {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&credentials.database)
        }
        .map_err(|err| DriverError::connect(format!("{}: {err}", credentials.database)))?;

        conn.busy_timeout(self.busy_timeout)
            .map_err(|err| DriverError::connect(err.to_string()))?;

        debug!(database = %credentials.database, "opened sqlite connection");
        Ok(Arc::new(SqliteConnection::new(conn, self.busy_timeout)))
    }
}

struct SqliteState {
    /// `None` once closed.
    conn: Option<rusqlite::Connection>,
    auto_commit: bool,
}

/// A SQLite connection.
///
/// Statements are serialized through an internal mutex. When auto-commit is
/// off, the first statement after a commit or rollback issues `BEGIN`.
pub struct SqliteConnection {
    state: Mutex<SqliteState>,
    closed: AtomicBool,
    busy_timeout: Duration,
}

impl SqliteConnection {
    fn new(conn: rusqlite::Connection, busy_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(SqliteState {
                conn: Some(conn),
                auto_commit: true,
            }),
            closed: AtomicBool::new(false),
            busy_timeout,
        }
    }

    /// Runs `f` against the open connection, opening a transaction first if
    /// auto-commit is off and none is pending.
    fn with_statement<T>(
        &self,
        f: impl FnOnce(&rusqlite::Connection) -> DriverResult<T>,
    ) -> DriverResult<T> {
        let state = self.state.lock();
        let conn = state.conn.as_ref().ok_or(DriverError::Closed)?;
        if !state.auto_commit && conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
        }
        f(conn)
    }

    /// Ends the pending transaction with `verb` if there is one.
    fn finish(&self, verb: &str) -> DriverResult<()> {
        let state = self.state.lock();
        let conn = state.conn.as_ref().ok_or(DriverError::Closed)?;
        if !conn.is_autocommit() {
            conn.execute_batch(verb)?;
        }
        Ok(())
    }
}

impl Connection for SqliteConnection {
    fn query(&self, sql: &str, params: &[Value]) -> DriverResult<QueryResult> {
        self.with_statement(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let columns: Arc<[String]> = stmt
                .column_names()
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
                .into();
            let width = columns.len();

            let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(width);
                for idx in 0..width {
                    values.push(from_value_ref(row.get_ref(idx)?));
                }
                out.push(Row::new(Arc::clone(&columns), values));
            }
            Ok(QueryResult::new(columns, out))
        })
    }

    fn execute(&self, sql: &str, params: &[Value]) -> DriverResult<UpdateResult> {
        self.with_statement(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let changed = stmt.execute(rusqlite::params_from_iter(params.iter()))?;
            let affected_rows = changed as u64;

            let mut result = UpdateResult::affected(affected_rows);
            if affected_rows > 0 && generates_keys(sql) {
                result.generated_keys.push(conn.last_insert_rowid());
            }
            Ok(result)
        })
    }

    fn auto_commit(&self) -> DriverResult<bool> {
        let state = self.state.lock();
        if state.conn.is_none() {
            return Err(DriverError::Closed);
        }
        Ok(state.auto_commit)
    }

    fn set_auto_commit(&self, enabled: bool) -> DriverResult<()> {
        let mut state = self.state.lock();
        let conn = state.conn.as_ref().ok_or(DriverError::Closed)?;
        if enabled && !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        state.auto_commit = enabled;
        Ok(())
    }

    fn commit(&self) -> DriverResult<()> {
        self.finish("COMMIT")
    }

    fn rollback(&self) -> DriverResult<()> {
        self.finish("ROLLBACK")
    }

    fn is_valid(&self, timeout: Duration) -> bool {
        let Some(state) = self.state.try_lock_for(timeout) else {
            return false;
        };
        let Some(conn) = state.conn.as_ref() else {
            return false;
        };
        if conn.busy_timeout(timeout).is_err() {
            return false;
        }
        let alive = conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok();
        if let Err(err) = conn.busy_timeout(self.busy_timeout) {
            debug!(error = %err, "failed to restore busy timeout after liveness check");
        }
        alive
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) -> DriverResult<()> {
        let mut state = self.state.lock();
        self.closed.store(true, Ordering::Release);
        match state.conn.take() {
            Some(conn) => conn.close().map_err(|(_, err)| DriverError::from(err)),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Self::Integer(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            Self::Real(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            Self::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Self::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
        })
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Blob(v.to_vec()),
    }
}

/// SQLite only reports a generated key through `last_insert_rowid`, which
/// is meaningful after INSERT and REPLACE.
fn generates_keys(sql: &str) -> bool {
    let head = sql.trim_start();
    ["INSERT", "REPLACE"].iter().any(|kw| {
        head.get(..kw.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(kw))
    })
}
