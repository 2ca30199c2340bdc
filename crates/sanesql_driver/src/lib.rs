//! # SaneSQL Driver
//!
//! Connection trait and driver implementations for SaneSQL.
//!
//! This crate is the lowest layer of SaneSQL. A driver knows how to open a
//! physical connection, run a statement with positional parameters, and toggle
//! the connection's auto-commit mode. It knows nothing about sessions,
//! reference counting, or which caller owns a transaction.
//!
//! ## Design Principles
//!
//! - Connections take `&self` everywhere and must be `Send + Sync`
//! - Statement results are fully materialized before they are returned
//! - Liveness probes are bounded and never fail with an error
//! - `sanesql_core` owns all session and transaction bookkeeping
//!
//! ## Available Drivers
//!
//! - [`SqliteConnector`] - Persistent or `:memory:` SQLite databases
//! - [`MockConnector`] - Recording fake for tests
//!
//! ## Example
//!
//! ```rust
//! use sanesql_driver::{params, Connector, Credentials, SqliteConnector};
//!
//! let connector = SqliteConnector::new();
//! let conn = connector.connect(&Credentials::sqlite(":memory:")).unwrap();
//! conn.execute("CREATE TABLE t (v TEXT)", &[]).unwrap();
//! let update = conn.execute("INSERT INTO t (v) VALUES (?1)", params!["hi"]).unwrap();
//! assert_eq!(update.affected_rows, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod connection;
mod credentials;
mod error;
mod mock;
mod sqlite;
mod value;

pub use connection::{Connection, Connector};
pub use credentials::Credentials;
pub use error::{DriverError, DriverResult};
pub use mock::{MockConnection, MockConnector, MockStats};
pub use sqlite::{SqliteConnection, SqliteConnector};
pub use value::{QueryResult, Row, UpdateResult, Value};
