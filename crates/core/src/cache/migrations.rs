//! Schema versions for the cache database.
//!
//! Applied versions are recorded in `_migrations`; each pending step runs in
//! its own transaction together with its bookkeeping row.

use super::Error;
use tokio_rusqlite::{Connection, params};

/// Ordered schema steps, keyed by version.
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_cache_entries.sql"))];

/// Bring the schema up to the latest version.
///
/// # Errors
///
/// Returns `Error::MigrationFailed` naming the step that did not apply.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )?;
        let current: i64 = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;

        for &(version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("version {version}: {e}")))?;
            tx.execute(
                "INSERT INTO _migrations (version, applied_at) VALUES (?1, ?2)",
                params![version, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version, "applied cache migration");
        }
        Ok(())
    })
    .await
    .map_err(Error::from)
}

/// Highest applied schema version, 0 for a fresh database.
pub async fn current_version(conn: &Connection) -> Result<i64, Error> {
    conn.call(|conn| -> Result<i64, Error> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = '_migrations')",
            [],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(0);
        }
        Ok(conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?)
    })
    .await
    .map_err(Error::from)
}
