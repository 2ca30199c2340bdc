//! Core type definitions for SaneSQL.

use std::fmt;
use std::thread::{self, ThreadId};

/// Key under which the session registry stores a caller's session.
///
/// Threads are keyed by their [`ThreadId`]. Callers that multiplex work on
/// their own scheduler can supply task identifiers instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallerId {
    /// An OS thread.
    Thread(ThreadId),
    /// A caller-supplied task identifier.
    Task(u64),
}

impl CallerId {
    /// Returns the identifier of the calling thread.
    #[must_use]
    pub fn current() -> Self {
        Self::Thread(thread::current().id())
    }

    /// Creates a task identifier.
    #[must_use]
    pub const fn task(id: u64) -> Self {
        Self::Task(id)
    }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thread(id) => write!(f, "thread:{id:?}"),
            Self::Task(id) => write!(f, "task:{id}"),
        }
    }
}

/// Identifier of a scoped session, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Creates a session ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_differs_across_threads() {
        let here = CallerId::current();
        let there = thread::spawn(CallerId::current).join().unwrap();
        assert_ne!(here, there);
        assert_eq!(here, CallerId::current());
    }

    #[test]
    fn display() {
        assert_eq!(CallerId::task(7).to_string(), "task:7");
        assert_eq!(SessionId::new(3).to_string(), "session:3");
    }
}
