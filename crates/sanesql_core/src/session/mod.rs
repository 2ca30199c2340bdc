//! Scoped, reference-counted transactional sessions.
//!
//! A [`ScopedSession`] lets an unknown number of nested callers share one
//! transaction:
//! - **Join**: every caller registers interest with `join()` or `tx()`
//! - **Release**: every caller calls `close()` exactly once, ideally through a
//!   [`SessionGuard`]
//! - **Last out**: the caller whose `close()` drops the count to zero ends the
//!   session; a transaction still open at that point is rolled back and
//!   reported as [`CoreError::ForcedRollback`](crate::CoreError::ForcedRollback)
//!
//! [`ScopedSessionManager`] hands each calling thread its own session and
//! replaces it once it has closed.

mod guard;
mod manager;
mod scoped;

pub use guard::SessionGuard;
pub use manager::{ScopedSessionManager, SessionFactory};
pub use scoped::ScopedSession;
