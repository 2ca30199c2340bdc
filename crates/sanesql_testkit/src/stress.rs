//! Stress tests for SaneSQL.
//!
//! These runners drive the session registry and nested transactions from
//! several threads at once.

use crate::fixtures::scenarios;
use sanesql_core::{params, CallerId, SaneSql};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Nesting depth of each transaction.
    pub depth: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 200,
            threads: 4,
            depth: 3,
        }
    }
}

fn run_threads<F>(config: &StressConfig, op: F) -> StressTestResult
where
    F: Fn(usize, usize) -> bool + Send + Sync,
{
    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|s| {
        for t in 0..config.threads {
            let (op, successful, failed) = (&op, &successful, &failed);
            s.spawn(move || {
                for i in 0..config.operations {
                    if op(t, i) {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Runs nested ledger deposits from several threads, each thread on its own
/// scoped session. `sql` must already have the ledger schema.
pub fn stress_nested_deposits(sql: &SaneSql, config: &StressConfig) -> StressTestResult {
    run_threads(config, |t, _| {
        let account = format!("account_{t}");
        scenarios::nested_deposit(sql, &account, 1, config.depth).is_ok()
    })
}

/// Opens and releases scoped sessions under synthetic caller IDs as fast as
/// possible. Every operation joins, runs one query and closes.
pub fn stress_registry_churn(sql: &SaneSql, config: &StressConfig) -> StressTestResult {
    run_threads(config, |t, i| {
        // A small pool of IDs per thread so entries are both reused and replaced.
        let caller = CallerId::task((t * 8 + i % 8) as u64);
        let Ok(session) = sql.scoped_for(caller) else {
            return false;
        };
        let Ok(guard) = session.enter() else {
            return false;
        };
        let ok = guard.query("SELECT ?1", params![i as i64]).is_ok();
        guard.close().is_ok() && ok
    })
}

/// Runs transactions where every other one fails, from several threads.
/// Returns the result and the number of transactions expected to commit.
pub fn stress_transaction_aborts(sql: &SaneSql, config: &StressConfig) -> (StressTestResult, usize) {
    let expected_commits = config.threads * config.operations.div_ceil(2);
    let result = run_threads(config, |t, i| {
        let account = format!("aborts_{t}");
        let outcome = if i % 2 == 0 {
            scenarios::nested_deposit(sql, &account, 1, config.depth)
        } else {
            scenarios::failing_nested_deposit(sql, &account, 1, config.depth)
        };
        outcome.is_ok()
    });
    (result, expected_commits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestSaneSql;

    fn quick_config() -> StressConfig {
        StressConfig {
            operations: 50,
            threads: 4,
            depth: 3,
        }
    }

    #[test]
    fn test_registry_churn_on_mock() {
        let test_sql = TestSaneSql::mock();
        let config = quick_config();

        let result = stress_registry_churn(&test_sql, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 200);

        // Every session was released, so all entries are purgeable.
        assert_eq!(test_sql.purge_closed_sessions().unwrap(), 32);
    }

    #[test]
    fn test_single_thread_nested_deposits() {
        let test_sql = scenarios::ledger_database();
        let config = StressConfig {
            threads: 1,
            ..quick_config()
        };

        let result = stress_nested_deposits(&test_sql, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(scenarios::ledger_rows(&test_sql), 150);
    }

    #[test]
    fn test_single_thread_aborts() {
        let test_sql = scenarios::ledger_database();
        let config = StressConfig {
            operations: 20,
            threads: 1,
            depth: 2,
        };

        let (result, expected) = stress_transaction_aborts(&test_sql, &config);
        assert_eq!(result.successful_ops, expected);
        assert_eq!(result.failed_ops, 10);
        assert_eq!(scenarios::ledger_rows(&test_sql), 20);
    }
}
