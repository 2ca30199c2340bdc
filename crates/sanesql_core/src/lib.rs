//! # SaneSQL Core
//!
//! Scoped transactional sessions over one shared SQL connection.
//!
//! This crate provides:
//! - A connection manager that opens, validates and replaces the connection
//! - Reference-counted sessions where nested calls share one transaction
//! - A per-caller session registry
//! - The [`SaneSql`] facade tying them together

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connection;
mod database;
mod error;
mod session;
mod statement;
mod types;

pub use config::Config;
pub use connection::ConnectionManager;
pub use database::SaneSql;
pub use error::{CoreError, CoreResult};
pub use session::{ScopedSession, ScopedSessionManager, SessionFactory, SessionGuard};
pub use types::{CallerId, SessionId};

pub use sanesql_driver::{
    params, Connection, Connector, Credentials, QueryResult, Row, UpdateResult, Value,
};
