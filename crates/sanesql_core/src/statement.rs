//! Statement execution on a borrowed connection.

use crate::error::CoreResult;
use sanesql_driver::{Connection, QueryResult, UpdateResult, Value};
use tracing::trace;

pub(crate) fn query(conn: &dyn Connection, sql: &str, params: &[Value]) -> CoreResult<QueryResult> {
    trace!(sql, params = params.len(), "query");
    Ok(conn.query(sql, params)?)
}

pub(crate) fn update(
    conn: &dyn Connection,
    sql: &str,
    params: &[Value],
) -> CoreResult<UpdateResult> {
    trace!(sql, params = params.len(), "update");
    Ok(conn.execute(sql, params)?)
}

pub(crate) fn update_raw(conn: &dyn Connection, sql: &str, params: &[Value]) -> CoreResult<u64> {
    update(conn, sql, params).map(|result| result.affected_rows)
}
