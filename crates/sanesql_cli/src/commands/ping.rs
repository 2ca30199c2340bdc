//! Ping command implementation.

use super::CliError;
use sanesql_core::SaneSql;
use tracing::info;

/// Runs the ping command.
pub fn run(db: &SaneSql) -> Result<(), CliError> {
    let database = db.connection_manager().credentials().database.clone();
    // Connections open lazily; make sure one exists before probing it.
    db.connection_manager().get_connection()?;

    if !db.has_active_connection() {
        return Err(CliError::Unreachable(database));
    }
    info!(%database, "database is reachable");
    println!("ok");
    Ok(())
}
