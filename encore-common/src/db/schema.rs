//! Schema creation
//!
//! All statements are idempotent (`CREATE TABLE IF NOT EXISTS`), so the
//! schema can be re-applied on every startup and in tests.
//!
//! Child tables (`reviews`, `review_keywords`, `review_likes`,
//! `keyword_summaries`, `favorites`, `attendances`) use autoincrement
//! integer primary keys; reconciliation scans them as keyset cursors.

use crate::Result;
use sqlx::SqlitePool;

/// Create all tables and indexes
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    create_users_table(pool).await?;
    create_clubs_table(pool).await?;
    create_performances_table(pool).await?;
    create_keywords_table(pool).await?;
    create_reviews_table(pool).await?;
    create_review_keywords_table(pool).await?;
    create_keyword_summaries_table(pool).await?;
    create_review_likes_table(pool).await?;
    create_favorites_table(pool).await?;
    create_attendances_table(pool).await?;
    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nickname TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_clubs_table(pool: &SqlitePool) -> Result<()> {
    // avg_rating / review_cnt are denormalized aggregates over reviews;
    // they are rewritten in the same transaction as any review mutation
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clubs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            avg_rating REAL NOT NULL DEFAULT 0,
            review_cnt INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_performances_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS performances (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            club_id INTEGER NOT NULL REFERENCES clubs(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            starts_at TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_keywords_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS keywords (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_reviews_table(pool: &SqlitePool) -> Result<()> {
    // like_count is the denormalized counter repaired by reconciliation
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reviews (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            club_id INTEGER NOT NULL REFERENCES clubs(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            content TEXT,
            like_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reviews_club_id ON reviews(club_id)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_review_keywords_table(pool: &SqlitePool) -> Result<()> {
    // Source-of-truth keyword links; the summary table is projected from here
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS review_keywords (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            review_id INTEGER NOT NULL REFERENCES reviews(id) ON DELETE CASCADE,
            keyword_id INTEGER NOT NULL REFERENCES keywords(id) ON DELETE CASCADE,
            UNIQUE (review_id, keyword_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_keyword_summaries_table(pool: &SqlitePool) -> Result<()> {
    // Denormalized projection; club_id lets the read path group keywords per
    // club without joining through reviews. May lag behind review_keywords
    // between reconciliation passes.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS keyword_summaries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            club_id INTEGER NOT NULL REFERENCES clubs(id) ON DELETE CASCADE,
            review_id INTEGER NOT NULL REFERENCES reviews(id) ON DELETE CASCADE,
            keyword_id INTEGER NOT NULL REFERENCES keywords(id) ON DELETE CASCADE,
            UNIQUE (review_id, keyword_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_keyword_summaries_club_id ON keyword_summaries(club_id)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_review_likes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS review_likes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            review_id INTEGER NOT NULL REFERENCES reviews(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (review_id, user_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_review_likes_review_id ON review_likes(review_id)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_favorites_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS favorites (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            club_id INTEGER NOT NULL REFERENCES clubs(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (user_id, club_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_attendances_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendances (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            performance_id INTEGER NOT NULL REFERENCES performances(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (user_id, performance_id)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
