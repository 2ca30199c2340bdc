//! Property tests comparing `ScopedSession` against the reference model.

use proptest::prelude::*;
use sanesql_core::ScopedSession;
use sanesql_driver::{Connection, Connector, Credentials, MockConnector};
use sanesql_testkit::prelude::*;

proptest! {
    #![proptest_config(PropTestConfig::default().to_proptest_config())]

    #[test]
    fn session_matches_model(ops in session_op_sequence_strategy(1, 48)) {
        let connector = MockConnector::new();
        let session = ScopedSession::new(connector.connect(&Credentials::default()).unwrap());
        let conn = connector.last_connection().unwrap();
        let mut model = SessionModel::default();

        for op in ops {
            let expected = model.apply(op);
            let actual = apply_to_session(&session, op);
            prop_assert_eq!(actual, expected, "diverged on {:?}", op);

            prop_assert_eq!(session.ref_count(), model.ref_count);
            prop_assert_eq!(session.has_transaction(), model.transaction_open);
            prop_assert_eq!(session.is_closed(), model.closed);
            prop_assert_eq!(session.has_references(), model.ref_count > 0);
        }

        let stats = conn.stats();
        prop_assert_eq!(stats.commits, model.commits);
        prop_assert_eq!(stats.rollbacks, model.rollbacks);
        // Auto-commit is never left off once no transaction is open.
        if !model.transaction_open {
            prop_assert!(conn.auto_commit().unwrap());
        }
    }

    #[test]
    fn nested_deposits_commit_every_level(depth in nesting_depth_strategy(), account in account_name_strategy()) {
        let test_sql = scenarios::ledger_database();
        scenarios::nested_deposit(&test_sql, &account, 2, depth).unwrap();
        prop_assert_eq!(scenarios::balance(&test_sql, &account), 2 * depth as i64);
    }

    #[test]
    fn failing_nested_deposits_leave_no_rows(depth in nesting_depth_strategy(), account in account_name_strategy()) {
        let test_sql = scenarios::ledger_database();
        prop_assert!(scenarios::failing_nested_deposit(&test_sql, &account, 2, depth).is_err());
        prop_assert_eq!(scenarios::ledger_rows(&test_sql), 0);
    }
}
