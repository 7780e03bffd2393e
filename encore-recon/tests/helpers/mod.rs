//! Shared test fixtures for the encore-recon integration tests

// Each test binary compiles this module separately and uses a subset of it
#![allow(dead_code)]

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// In-memory test database with the full schema applied.
///
/// Pinned to a single connection: with SQLite, each `:memory:` connection is
/// its own database, and one connection also serializes the test's queries.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();

    encore_common::db::apply_schema(&pool)
        .await
        .expect("Failed to apply schema");

    pool
}

/// File-backed test database for tests that need concurrent connections.
///
/// Returns the tempdir guard alongside the pool; dropping it removes the
/// database file.
pub async fn setup_test_db_file(max_connections: u32) -> (tempfile::TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("encore-test.db");

    let options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .expect("Failed to create file-backed database");

    encore_common::db::apply_schema(&pool)
        .await
        .expect("Failed to apply schema");

    (dir, pool)
}

/// Insert a user and return its id
pub async fn seed_user(pool: &SqlitePool, nickname: &str) -> i64 {
    sqlx::query("INSERT INTO users (nickname) VALUES (?)")
        .bind(nickname)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

/// Insert a club and return its id
pub async fn seed_club(pool: &SqlitePool, name: &str) -> i64 {
    sqlx::query("INSERT INTO clubs (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

/// Insert a performance and return its id
pub async fn seed_performance(pool: &SqlitePool, club_id: i64, title: &str) -> i64 {
    sqlx::query("INSERT INTO performances (club_id, title) VALUES (?, ?)")
        .bind(club_id)
        .bind(title)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

/// Insert a keyword and return its id
pub async fn seed_keyword(pool: &SqlitePool, label: &str) -> i64 {
    sqlx::query("INSERT INTO keywords (label) VALUES (?)")
        .bind(label)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}
