//! Update command implementation.

use super::{parse_params, CliError, OutputFormat};
use sanesql_core::{SaneSql, UpdateResult};
use std::io::Write;

/// Runs the update command.
pub fn run(db: &SaneSql, sql: &str, params: &[String], format: OutputFormat) -> Result<(), CliError> {
    let result = db.update(sql, &parse_params(params))?;
    let mut out = std::io::stdout().lock();
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?,
        OutputFormat::Text => write_text(&mut out, &result)?,
    }
    Ok(())
}

fn write_text(out: &mut impl Write, result: &UpdateResult) -> std::io::Result<()> {
    writeln!(out, "{} row(s) affected", result.affected_rows)?;
    if !result.generated_keys.is_empty() {
        let keys: Vec<String> = result.generated_keys.iter().map(i64::to_string).collect();
        writeln!(out, "generated keys: {}", keys.join(", "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_output_lists_keys() {
        let result = UpdateResult {
            affected_rows: 1,
            generated_keys: vec![9],
        };
        let mut out = Vec::new();
        write_text(&mut out, &result).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "1 row(s) affected\ngenerated keys: 9\n"
        );
    }

    #[test]
    fn text_output_omits_empty_keys() {
        let mut out = Vec::new();
        write_text(&mut out, &UpdateResult::affected(3)).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "3 row(s) affected\n");
    }

    #[test]
    fn run_reports_statement_errors() {
        let db = SaneSql::open_sqlite(":memory:");
        let err = run(&db, "INSERT INTO missing VALUES (1)", &[], OutputFormat::Text).unwrap_err();
        assert!(matches!(err, CliError::Core(_)));
    }
}
