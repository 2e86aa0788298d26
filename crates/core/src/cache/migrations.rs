//! Cache schema versioning.
//!
//! `_migrations` holds one row per applied step. A step and its row are
//! committed in the same transaction, so an interrupted upgrade leaves the
//! file at the previous version and the next open retries it.

use super::Error;
use tokio_rusqlite::{Connection, params, rusqlite};

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ordered by version; append only.
const MIGRATIONS: &[Migration] = &[
    Migration { version: 1, name: "generations", sql: include_str!("../../migrations/001_generations.sql") },
    Migration { version: 2, name: "entry_lookup", sql: include_str!("../../migrations/002_entry_lookup.sql") },
];

fn latest() -> i64 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Bring the cache schema up to date and return the resulting version.
///
/// A file written by a newer build is refused rather than opened with a
/// schema this build does not understand.
pub async fn run(conn: &Connection) -> Result<i64, Error> {
    conn.call(|conn| -> Result<i64, Error> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current = schema_version(conn)?;
        if current > latest() {
            return Err(Error::MigrationFailed(format!(
                "cache schema version {current} is newer than supported version {}",
                latest()
            )));
        }

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            let tx = conn.transaction()?;
            tx.execute_batch(migration.sql)
                .map_err(|e| Error::MigrationFailed(format!("{} ({}): {e}", migration.version, migration.name)))?;
            tx.execute(
                "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                params![migration.version, migration.name, chrono::Utc::now().to_rfc3339()],
            )?;
            tx.commit()?;
            tracing::debug!(version = migration.version, name = migration.name, "applied cache migration");
        }

        schema_version(conn)
    })
    .await
    .map_err(Error::from)
}

fn schema_version(conn: &rusqlite::Connection) -> Result<i64, Error> {
    let version = conn.query_row("SELECT COALESCE(MAX(version), 0) FROM _migrations", [], |row| row.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rerun_is_noop() {
        let conn = Connection::open_in_memory().await.unwrap();
        assert_eq!(run(&conn).await.unwrap(), latest());
        assert_eq!(run(&conn).await.unwrap(), latest());

        let (tables, rows) = conn
            .call(|conn| -> rusqlite::Result<(i64, i64)> {
                let tables = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('generations', 'entries')",
                    [],
                    |row| row.get(0),
                )?;
                let rows = conn.query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))?;
                Ok((tables, rows))
            })
            .await
            .unwrap();

        assert_eq!(tables, 2);
        assert_eq!(rows, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_steps_are_recorded_by_name() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();

        let names: Vec<String> = conn
            .call(|conn| -> rusqlite::Result<Vec<String>> {
                let mut stmt = conn.prepare("SELECT name FROM _migrations ORDER BY version")?;
                stmt.query_map([], |row| row.get(0))?.collect()
            })
            .await
            .unwrap();

        assert_eq!(names, vec!["generations", "entry_lookup"]);
    }

    #[tokio::test]
    async fn test_newer_schema_is_refused() {
        let conn = Connection::open_in_memory().await.unwrap();
        run(&conn).await.unwrap();
        conn.call(|conn| -> rusqlite::Result<()> {
            conn.execute(
                "INSERT INTO _migrations (version, name, applied_at) VALUES (99, 'future', '2030-01-01T00:00:00Z')",
                [],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        let result = run(&conn).await;
        assert!(matches!(result, Err(Error::MigrationFailed(ref msg)) if msg.contains("99")));
    }
}
