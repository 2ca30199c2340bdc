//! # SaneSQL Testkit
//!
//! Test utilities for SaneSQL.
//!
//! This crate provides:
//! - Fixtures for in-memory, file-backed and mock-backed facades
//! - Nested-call scenarios over a small ledger schema
//! - Property-based generators and a reference model for session operations
//! - Multi-thread stress runners
//!
//! ## Usage
//!
//! ```rust
//! use sanesql_testkit::prelude::*;
//!
//! with_ledger(|sql| {
//!     scenarios::nested_deposit(sql, "alex", 10, 3).unwrap();
//!     assert_eq!(scenarios::balance(sql, "alex"), 30);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use stress::*;
