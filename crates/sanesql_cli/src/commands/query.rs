//! Query command implementation.

use super::{parse_params, render, CliError, OutputFormat};
use sanesql_core::{QueryResult, SaneSql};
use serde_json::{Map, Value as Json};
use std::io::Write;

/// Runs the query command.
pub fn run(db: &SaneSql, sql: &str, params: &[String], format: OutputFormat) -> Result<(), CliError> {
    let rows = db.query(sql, &parse_params(params))?;
    let mut out = std::io::stdout().lock();
    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::to_string_pretty(&to_json(&rows)?)?)?;
        }
        OutputFormat::Text => write_text(&mut out, &rows)?,
    }
    Ok(())
}

/// Converts rows into an array of column-keyed objects.
pub fn to_json(rows: &QueryResult) -> Result<Json, CliError> {
    let mut objects = Vec::with_capacity(rows.len());
    for row in rows.rows() {
        let mut object = Map::new();
        for (column, value) in rows.columns().iter().zip(row.values()) {
            object.insert(column.clone(), serde_json::to_value(value)?);
        }
        objects.push(Json::Object(object));
    }
    Ok(Json::Array(objects))
}

/// Writes a tab-separated header line followed by one line per row.
pub fn write_text(out: &mut impl Write, rows: &QueryResult) -> std::io::Result<()> {
    writeln!(out, "{}", rows.columns().join("\t"))?;
    for row in rows.rows() {
        let line: Vec<String> = row.values().iter().map(render).collect();
        writeln!(out, "{}", line.join("\t"))?;
    }
    Ok(())
}
