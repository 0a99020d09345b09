//! Database health checks.

use tracing::{debug, error};

use crate::client::Database;

/// Check that the DB thread answers a trivial query.
pub async fn check_connection(db: &Database) -> bool {
    let result = db
        .execute(|conn| {
            let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
            Ok(one)
        })
        .await;

    match result {
        Ok(1) => {
            debug!("SQLite connection healthy");
            true
        }
        Ok(other) => {
            error!("SQLite health check returned {}", other);
            false
        }
        Err(e) => {
            error!("SQLite health check failed: {:#}", e);
            false
        }
    }
}
