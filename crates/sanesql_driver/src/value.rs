//! Parameter, row and result types shared by all drivers.

use serde::Serialize;
use std::sync::Arc;

/// A value that can be bound to a statement parameter or read from a column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Binary blob.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns the integer value, if this is an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text value, if this is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Returns true if this is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Builds a positional parameter slice.
///
/// Usage: `params![42_i64, "text", blob.as_slice()]`
#[macro_export]
macro_rules! params {
    ($($val:expr),* $(,)?) => {
        &[$($crate::Value::from($val)),*][..]
    };
}

/// A single result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Creates a row. `values` must line up with `columns`.
    #[must_use]
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Returns the value at column index `idx`.
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Returns the value of the column called `name`.
    #[must_use]
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.values.get(idx)
    }

    /// Returns all values in column order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Rows returned by a query.
///
/// The statement that produced the rows has already been finalized; dropping
/// the result releases the row data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    columns: Arc<[String]>,
    rows: Vec<Row>,
}

impl QueryResult {
    /// Creates a result from column names and rows.
    #[must_use]
    pub fn new(columns: Arc<[String]>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Creates a result with the given columns and raw value rows.
    #[must_use]
    pub fn from_values(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let columns: Arc<[String]> = columns.into();
        let rows = rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&columns), values))
            .collect();
        Self { columns, rows }
    }

    /// Returns the column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the first row, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the query produced no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// Outcome of an INSERT, UPDATE or DELETE.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateResult {
    /// Number of rows changed.
    pub affected_rows: u64,
    /// Keys generated by the statement, in generation order.
    pub generated_keys: Vec<i64>,
}

impl UpdateResult {
    /// Creates a result with no generated keys.
    #[must_use]
    pub fn affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            generated_keys: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_macro_converts_values() {
        assert_eq!(
            params![1_i64, "two", 3.0_f64, None::<i64>],
            &[
                Value::Integer(1),
                Value::Text("two".into()),
                Value::Real(3.0),
                Value::Null
            ]
        );
    }

    #[test]
    fn row_lookup_by_name() {
        let result = QueryResult::from_values(
            vec!["id".into(), "name".into()],
            vec![vec![Value::Integer(7), Value::from("steve")]],
        );
        let row = result.first().unwrap();
        assert_eq!(row.get_named("name").and_then(Value::as_str), Some("steve"));
        assert_eq!(row.get(0).and_then(Value::as_i64), Some(7));
        assert!(row.get_named("missing").is_none());
    }

    #[test]
    fn values_serialize_untagged() {
        let json = serde_json::to_string(&vec![Value::Integer(1), Value::Null]).unwrap();
        assert_eq!(json, "[1,null]");
    }
}
