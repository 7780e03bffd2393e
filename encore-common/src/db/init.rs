//! Database initialization
//!
//! Opens (or creates) the SQLite database, applies connection pragmas on
//! every pooled connection, and creates the schema idempotently.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection pool and create tables if needed
///
/// Pragmas are applied per pooled connection via the connect options:
/// - `foreign_keys = ON` (cascaded deletes keep child tables in step)
/// - `journal_mode = WAL` (concurrent readers alongside one writer)
/// - `busy_timeout` (writers wait instead of failing under contention)
pub async fn init_database(db_path: &Path, busy_timeout_ms: u64) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    crate::db::schema::apply_schema(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("encore.db");

        let pool = init_database(&db_path, 5000).await.unwrap();

        assert!(db_path.exists());

        // Schema is in place: a club row can be inserted and read back
        sqlx::query("INSERT INTO clubs (name) VALUES ('Blue Note')")
            .execute(&pool)
            .await
            .unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clubs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("encore.db");

        let pool = init_database(&db_path, 5000).await.unwrap();
        sqlx::query("INSERT INTO clubs (name) VALUES ('Blue Note')")
            .execute(&pool)
            .await
            .unwrap();
        drop(pool);

        // Re-opening must not recreate tables or lose data
        let pool = init_database(&db_path, 5000).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clubs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
