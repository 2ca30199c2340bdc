//! Script command implementation.

use super::{query::write_text, CliError};
use sanesql_core::{CoreError, SaneSql};
use std::path::Path;
use tracing::{debug, info, warn};

/// Runs every statement in `file` inside one scoped transaction.
///
/// Row-returning statements print their rows. The first failure rolls the
/// whole script back.
pub fn run(db: &SaneSql, file: &Path) -> Result<(), CliError> {
    let text = std::fs::read_to_string(file)?;
    let statements = split_statements(&text);
    let executed = execute(db, &statements)?;
    info!(statements = executed, file = %file.display(), "script committed");
    Ok(())
}

/// Runs `statements` in one transaction and returns how many ran.
pub fn execute(db: &SaneSql, statements: &[String]) -> Result<usize, CliError> {
    let mut executed = 0;
    let result = db.transaction(|session| {
        for statement in statements {
            debug!(index = executed + 1, sql = %statement, "running statement");
            if returns_rows(statement) {
                let rows = session.query(statement, &[])?;
                // Output errors are not statement failures.
                if let Err(err) = write_text(&mut std::io::stdout().lock(), &rows) {
                    warn!(index = executed + 1, error = %err, "failed to write rows");
                }
            } else {
                session.update_raw(statement, &[])?;
            }
            executed += 1;
        }
        Ok(())
    });

    result.map_err(|source| script_error(executed, statements.len(), source))?;
    Ok(executed)
}

/// Attributes a failed script to the statement that was running, or to the
/// commit once every statement has run.
fn script_error(executed: usize, total: usize, source: CoreError) -> CliError {
    if executed >= total {
        CliError::Commit { source }
    } else {
        CliError::Script {
            statement: executed + 1,
            source,
        }
    }
}

fn returns_rows(statement: &str) -> bool {
    let head = statement
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(head.as_str(), "SELECT" | "WITH" | "VALUES" | "PRAGMA")
}

/// Splits script text on `;`, ignoring semicolons inside quoted strings,
/// quoted identifiers and `--` comments. Empty statements are dropped.
pub fn split_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    current.push(c);
                }
                '-' if chars.peek() == Some(&'-') => {
                    for skipped in chars.by_ref() {
                        if skipped == '\n' {
                            current.push('\n');
                            break;
                        }
                    }
                }
                ';' => {
                    push_statement(&mut statements, &current);
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sanesql_core::Value;

    fn count(db: &SaneSql) -> i64 {
        db.query("SELECT COUNT(*) FROM t", &[])
            .unwrap()
            .first()
            .and_then(|row| row.get(0))
            .and_then(Value::as_i64)
            .unwrap()
    }

    #[test]
    fn split_respects_quotes_and_comments() {
        let text = "CREATE TABLE t (v TEXT);\n\
                    -- a comment; with a semicolon\n\
                    INSERT INTO t VALUES ('a;b');;\n\
                    INSERT INTO \"t\" VALUES ('it''s')";
        assert_eq!(
            split_statements(text),
            vec![
                "CREATE TABLE t (v TEXT)".to_string(),
                "INSERT INTO t VALUES ('a;b')".to_string(),
                "INSERT INTO \"t\" VALUES ('it''s')".to_string(),
            ]
        );
    }

    #[test]
    fn row_returning_statements_are_detected() {
        assert!(returns_rows("select 1"));
        assert!(returns_rows("  WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!returns_rows("INSERT INTO t VALUES (1)"));
        assert!(!returns_rows(""));
    }

    #[test]
    fn script_commits_all_statements() {
        let db = SaneSql::open_sqlite(":memory:");
        let statements = split_statements(
            "CREATE TABLE t (v INTEGER); INSERT INTO t VALUES (1); INSERT INTO t VALUES (2); SELECT * FROM t",
        );
        assert_eq!(execute(&db, &statements).unwrap(), 4);
        assert_eq!(count(&db), 2);
    }

    #[test]
    fn script_failure_rolls_back_everything() {
        let db = SaneSql::open_sqlite(":memory:");
        db.update_raw("CREATE TABLE t (v INTEGER NOT NULL)", &[]).unwrap();

        let statements = split_statements(
            "INSERT INTO t VALUES (1); INSERT INTO t VALUES (NULL); INSERT INTO t VALUES (3)",
        );
        let err = execute(&db, &statements).unwrap_err();

        assert!(matches!(err, CliError::Script { statement: 2, .. }));
        assert_eq!(count(&db), 0);
    }

    #[test]
    fn failure_after_last_statement_is_commit_error() {
        let err = script_error(3, 3, CoreError::NoActiveTransaction);
        assert!(matches!(err, CliError::Commit { .. }));
        assert!(err.to_string().starts_with("script commit failed"));

        let err = script_error(1, 3, CoreError::NoActiveTransaction);
        assert!(matches!(err, CliError::Script { statement: 2, .. }));
    }

    #[test]
    fn run_reads_script_file() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("seed.sql");
        std::fs::write(&script, "CREATE TABLE t (v INTEGER);\nINSERT INTO t VALUES (1);\n").unwrap();

        let db = SaneSql::open_sqlite(":memory:");
        run(&db, &script).unwrap();
        assert_eq!(count(&db), 1);
    }
}
