//! Property-based test generators using proptest.
//!
//! Provides strategies for sequences of session operations and a small
//! reference model that predicts how a [`ScopedSession`] should answer them.

use proptest::prelude::*;
use sanesql_core::{CoreError, CoreResult, ScopedSession};

/// One operation on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOp {
    /// `join()`
    Join,
    /// `tx()`
    Tx,
    /// `close()`
    Close,
    /// `commit()`
    Commit,
    /// `commit_if_last()`
    CommitIfLast,
    /// `commit_if_last_and_changed()`
    CommitIfLastAndChanged,
    /// `rollback_and_close()`
    RollbackAndClose,
}

/// What an operation returned, with errors reduced to their kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The call succeeded.
    Ok,
    /// `CoreError::SessionClosed`
    SessionClosed,
    /// `CoreError::NoActiveTransaction`
    NoActiveTransaction,
    /// `CoreError::ForcedRollback`
    ForcedRollback,
    /// Any other error.
    Other,
}

impl Outcome {
    /// Reduces a session call's result to its outcome.
    pub fn of<T>(result: &CoreResult<T>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(CoreError::SessionClosed) => Self::SessionClosed,
            Err(CoreError::NoActiveTransaction) => Self::NoActiveTransaction,
            Err(CoreError::ForcedRollback { .. }) => Self::ForcedRollback,
            Err(_) => Self::Other,
        }
    }
}

/// Reference model of a session backed by a connection that never fails.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionModel {
    /// Expected reference count.
    pub ref_count: usize,
    /// Expected transaction flag.
    pub transaction_open: bool,
    /// Expected closed flag.
    pub closed: bool,
    /// Expected number of driver commits so far.
    pub commits: usize,
    /// Expected number of driver rollbacks so far.
    pub rollbacks: usize,
}

impl SessionModel {
    /// Applies `op` to the model and returns the expected outcome.
    pub fn apply(&mut self, op: SessionOp) -> Outcome {
        match op {
            SessionOp::Join => {
                if self.closed {
                    return Outcome::SessionClosed;
                }
                self.ref_count += 1;
                Outcome::Ok
            }
            SessionOp::Tx => {
                if self.closed {
                    return Outcome::SessionClosed;
                }
                self.ref_count += 1;
                self.transaction_open = true;
                Outcome::Ok
            }
            SessionOp::Close => {
                self.ref_count = self.ref_count.saturating_sub(1);
                if self.ref_count > 0 || self.closed {
                    return Outcome::Ok;
                }
                self.closed = true;
                if self.transaction_open {
                    self.transaction_open = false;
                    self.rollbacks += 1;
                    return Outcome::ForcedRollback;
                }
                Outcome::Ok
            }
            SessionOp::Commit => self.commit(),
            SessionOp::CommitIfLast => {
                if self.ref_count > 1 {
                    return Outcome::Ok;
                }
                self.commit()
            }
            SessionOp::CommitIfLastAndChanged => {
                if !self.transaction_open || self.ref_count > 1 {
                    return Outcome::Ok;
                }
                self.commit()
            }
            SessionOp::RollbackAndClose => {
                if self.closed || !self.transaction_open {
                    return Outcome::NoActiveTransaction;
                }
                self.rollbacks += 1;
                self.ref_count = 0;
                self.transaction_open = false;
                self.closed = true;
                Outcome::Ok
            }
        }
    }

    fn commit(&mut self) -> Outcome {
        if self.closed || !self.transaction_open {
            return Outcome::NoActiveTransaction;
        }
        self.transaction_open = false;
        self.commits += 1;
        Outcome::Ok
    }
}

/// Applies `op` to a real session and returns the outcome.
pub fn apply_to_session(session: &ScopedSession, op: SessionOp) -> Outcome {
    match op {
        SessionOp::Join => Outcome::of(&session.join()),
        SessionOp::Tx => Outcome::of(&session.tx()),
        SessionOp::Close => Outcome::of(&session.close()),
        SessionOp::Commit => Outcome::of(&session.commit()),
        SessionOp::CommitIfLast => Outcome::of(&session.commit_if_last()),
        SessionOp::CommitIfLastAndChanged => Outcome::of(&session.commit_if_last_and_changed()),
        SessionOp::RollbackAndClose => Outcome::of(&session.rollback_and_close()),
    }
}

/// Strategy for a single session operation, weighted towards joins and closes.
pub fn session_op_strategy() -> impl Strategy<Value = SessionOp> {
    prop_oneof![
        4 => Just(SessionOp::Join),
        3 => Just(SessionOp::Tx),
        5 => Just(SessionOp::Close),
        1 => Just(SessionOp::Commit),
        2 => Just(SessionOp::CommitIfLast),
        1 => Just(SessionOp::CommitIfLastAndChanged),
        1 => Just(SessionOp::RollbackAndClose),
    ]
}

/// Strategy for a sequence of session operations.
pub fn session_op_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<SessionOp>> {
    prop::collection::vec(session_op_strategy(), min_ops..max_ops)
}

/// Strategy for nesting depths of `transaction` calls.
pub fn nesting_depth_strategy() -> impl Strategy<Value = usize> {
    1usize..12
}

/// Strategy for ledger account names.
pub fn account_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_forced_rollback_scenario() {
        let mut model = SessionModel::default();
        assert_eq!(model.apply(SessionOp::Join), Outcome::Ok);
        assert_eq!(model.apply(SessionOp::Tx), Outcome::Ok);
        assert_eq!(model.apply(SessionOp::Tx), Outcome::Ok);
        assert_eq!(model.apply(SessionOp::Close), Outcome::Ok);
        assert_eq!(model.apply(SessionOp::Close), Outcome::Ok);
        assert_eq!(model.apply(SessionOp::Close), Outcome::ForcedRollback);
        assert!(model.closed);
        assert_eq!(model.apply(SessionOp::Join), Outcome::SessionClosed);
    }

    #[test]
    fn model_commit_if_last() {
        let mut model = SessionModel::default();
        model.apply(SessionOp::Tx);
        model.apply(SessionOp::Tx);
        assert_eq!(model.apply(SessionOp::CommitIfLast), Outcome::Ok);
        assert_eq!(model.commits, 0);
        model.apply(SessionOp::Close);
        assert_eq!(model.apply(SessionOp::CommitIfLast), Outcome::Ok);
        assert_eq!(model.commits, 1);
    }

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn model_ref_count_never_underflows(ops in session_op_sequence_strategy(0, 64)) {
            let mut model = SessionModel::default();
            for op in ops {
                model.apply(op);
                prop_assert!(!model.transaction_open || model.ref_count >= 1);
                prop_assert!(!model.closed || model.ref_count == 0);
            }
        }

        #[test]
        fn account_names_are_nonempty(name in account_name_strategy()) {
            prop_assert!(!name.is_empty());
        }
    }
}
