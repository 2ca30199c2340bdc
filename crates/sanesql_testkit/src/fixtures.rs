//! Test fixtures and facade helpers.
//!
//! Provides convenience functions for setting up a [`SaneSql`] against
//! SQLite or the mock driver, plus common nested-call scenarios.

use sanesql_core::{Config, Connector, Credentials, SaneSql};
use sanesql_driver::{MockConnection, MockConnector};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A test facade with automatic cleanup.
pub struct TestSaneSql {
    /// The facade instance.
    pub sql: SaneSql,
    connector: Option<Arc<MockConnector>>,
    /// Kept alive so the database file outlives the facade.
    temp_dir: Option<TempDir>,
}

impl TestSaneSql {
    /// Creates a facade over a private in-memory SQLite database.
    pub fn memory() -> Self {
        Self {
            sql: SaneSql::open_sqlite(":memory:"),
            connector: None,
            temp_dir: None,
        }
    }

    /// Creates a facade over a SQLite file in a temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("test.db");
        Self {
            sql: SaneSql::open_sqlite(path.to_string_lossy()),
            connector: None,
            temp_dir: Some(temp_dir),
        }
    }

    /// Creates a facade over the mock driver.
    pub fn mock() -> Self {
        Self::mock_with_config(Config::default())
    }

    /// Creates a facade over the mock driver with a custom configuration.
    pub fn mock_with_config(config: Config) -> Self {
        let connector = Arc::new(MockConnector::new());
        let sql = SaneSql::new(
            Arc::clone(&connector) as Arc<dyn Connector>,
            Credentials::new("localhost", "test", "tester", "secret"),
            config,
        );
        Self {
            sql,
            connector: Some(connector),
            temp_dir: None,
        }
    }

    /// Returns the database path if file-based, None otherwise.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().join("test.db"))
    }

    /// Opens a second, independent facade on the same database file.
    ///
    /// Returns None unless the fixture is file-based.
    pub fn reopen(&self) -> Option<SaneSql> {
        self.path()
            .map(|path| SaneSql::open_sqlite(path.to_string_lossy()))
    }

    /// Returns the mock connector, if this is a mock fixture.
    pub fn connector(&self) -> Option<&Arc<MockConnector>> {
        self.connector.as_ref()
    }

    /// Returns the most recent mock connection.
    ///
    /// # Panics
    ///
    /// Panics if this is not a mock fixture or nothing has connected yet.
    pub fn mock_connection(&self) -> Arc<MockConnection> {
        self.connector
            .as_ref()
            .and_then(|connector| connector.last_connection())
            .expect("No mock connection")
    }
}

impl std::ops::Deref for TestSaneSql {
    type Target = SaneSql;

    fn deref(&self) -> &Self::Target {
        &self.sql
    }
}

/// Runs a test with a temporary in-memory facade.
///
/// # Example
///
/// ```rust
/// use sanesql_testkit::with_temp_sql;
///
/// with_temp_sql(|sql| {
///     assert_eq!(sql.update_raw("CREATE TABLE t (v INTEGER)", &[]).unwrap(), 0);
/// });
/// ```
pub fn with_temp_sql<F, R>(f: F) -> R
where
    F: FnOnce(&SaneSql) -> R,
{
    let test_sql = TestSaneSql::memory();
    f(&test_sql.sql)
}

/// Runs a test with a temporary file-backed facade.
pub fn with_file_sql<F, R>(f: F) -> R
where
    F: FnOnce(&SaneSql, &std::path::Path) -> R,
{
    let test_sql = TestSaneSql::file();
    let path = test_sql.path().expect("File database should have a path");
    f(&test_sql.sql, &path)
}

/// Runs a test with an in-memory facade that already has the ledger schema.
pub fn with_ledger<F, R>(f: F) -> R
where
    F: FnOnce(&SaneSql) -> R,
{
    let test_sql = scenarios::ledger_database();
    f(&test_sql.sql)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use sanesql_core::{params, CoreResult, Value};

    /// Schema used by the ledger scenarios.
    pub const LEDGER_SCHEMA: &str = "CREATE TABLE ledger (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account TEXT NOT NULL,
        amount INTEGER NOT NULL CHECK (amount <> 0)
    )";

    /// Creates an in-memory facade with the ledger schema.
    pub fn ledger_database() -> TestSaneSql {
        let test_sql = TestSaneSql::memory();
        create_ledger(&test_sql);
        test_sql
    }

    /// Creates a file-backed facade with the ledger schema.
    pub fn file_ledger_database() -> TestSaneSql {
        let test_sql = TestSaneSql::file();
        create_ledger(&test_sql);
        test_sql
    }

    fn create_ledger(sql: &SaneSql) {
        sql.update_raw(LEDGER_SCHEMA, &[])
            .expect("Failed to create ledger");
    }

    /// Inserts one ledger row per nesting level, each level inside its own
    /// `transaction` call on the same thread. All rows share the outermost
    /// transaction.
    pub fn nested_deposit(sql: &SaneSql, account: &str, amount: i64, depth: usize) -> CoreResult<()> {
        if depth == 0 {
            return Ok(());
        }
        sql.transaction(|session| {
            session.update(
                "INSERT INTO ledger (account, amount) VALUES (?1, ?2)",
                params![account, amount],
            )?;
            nested_deposit(sql, account, amount, depth - 1)
        })
    }

    /// Like [`nested_deposit`], but the innermost level fails after its
    /// insert, so the whole chain is rolled back.
    pub fn failing_nested_deposit(
        sql: &SaneSql,
        account: &str,
        amount: i64,
        depth: usize,
    ) -> CoreResult<()> {
        sql.transaction(|session| {
            session.update(
                "INSERT INTO ledger (account, amount) VALUES (?1, ?2)",
                params![account, amount],
            )?;
            if depth <= 1 {
                // Violates the CHECK constraint.
                session.update(
                    "INSERT INTO ledger (account, amount) VALUES (?1, 0)",
                    params![account],
                )?;
                return Ok(());
            }
            failing_nested_deposit(sql, account, amount, depth - 1)
        })
    }

    /// Returns the summed ledger amount for `account`.
    pub fn balance(sql: &SaneSql, account: &str) -> i64 {
        let rows = sql
            .query(
                "SELECT COALESCE(SUM(amount), 0) FROM ledger WHERE account = ?1",
                params![account],
            )
            .expect("Failed to read balance");
        rows.first()
            .and_then(|row| row.get(0))
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    /// Returns the number of ledger rows.
    pub fn ledger_rows(sql: &SaneSql) -> i64 {
        sql.query("SELECT COUNT(*) FROM ledger", &[])
            .expect("Failed to count ledger rows")
            .first()
            .and_then(|row| row.get(0))
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }
}
