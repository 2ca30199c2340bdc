//! CLI command implementations.

pub mod ping;
pub mod query;
pub mod script;
pub mod update;

use sanesql_core::{CoreError, SaneSql, Value};
use std::path::Path;
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// No `--database` was given.
    #[error("database path required for {0}")]
    MissingDatabase(&'static str),

    /// The database did not answer a liveness probe.
    #[error("database {0} is not reachable")]
    Unreachable(String),

    /// A script statement failed and the script was rolled back.
    #[error("statement {statement} failed, script rolled back: {source}")]
    Script {
        /// 1-based index of the failing statement.
        statement: usize,
        /// The underlying error.
        #[source]
        source: CoreError,
    },

    /// Every statement ran but the script could not be committed.
    #[error("script commit failed: {source}")]
    Commit {
        /// The underlying error.
        #[source]
        source: CoreError,
    },

    /// A core operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Reading input failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Writing JSON output failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Output format for rows and update results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Tab-separated text
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Opens the database named on the command line.
pub fn open(path: Option<&Path>, command: &'static str) -> Result<SaneSql, CliError> {
    let path = path.ok_or(CliError::MissingDatabase(command))?;
    Ok(SaneSql::open_sqlite(path.to_string_lossy()))
}

/// Parses a command-line parameter: integer, then real, then `null`,
/// otherwise text.
pub fn parse_param(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Integer(int);
    }
    if let Ok(real) = raw.parse::<f64>() {
        if real.is_finite() {
            return Value::Real(real);
        }
    }
    if raw.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    Value::Text(raw.to_string())
}

/// Parses every parameter in order.
pub fn parse_params(raw: &[String]) -> Vec<Value> {
    raw.iter().map(|p| parse_param(p)).collect()
}

/// Renders a value for text output.
pub fn render(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Real(v) => v.to_string(),
        Value::Text(v) => v.clone(),
        Value::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
            format!("x'{hex}'")
        }
    }
}
