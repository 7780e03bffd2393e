//! Database models and row loaders

use crate::Result;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Club row with its denormalized review aggregates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Club {
    pub id: i64,
    pub name: String,
    pub avg_rating: f64,
    pub review_cnt: i64,
}

/// Review row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub club_id: i64,
    pub user_id: i64,
    pub rating: i64,
    pub content: Option<String>,
    pub like_count: i64,
}

/// Load a club by id
pub async fn load_club(pool: &SqlitePool, club_id: i64) -> Result<Option<Club>> {
    let row: Option<(i64, String, f64, i64)> = sqlx::query_as(
        "SELECT id, name, avg_rating, review_cnt FROM clubs WHERE id = ?",
    )
    .bind(club_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(id, name, avg_rating, review_cnt)| Club {
        id,
        name,
        avg_rating,
        review_cnt,
    }))
}

/// Load a review by id
pub async fn load_review(pool: &SqlitePool, review_id: i64) -> Result<Option<Review>> {
    let row: Option<(i64, i64, i64, i64, Option<String>, i64)> = sqlx::query_as(
        "SELECT id, club_id, user_id, rating, content, like_count FROM reviews WHERE id = ?",
    )
    .bind(review_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(
        |(id, club_id, user_id, rating, content, like_count)| Review {
            id,
            club_id,
            user_id,
            rating,
            content,
            like_count,
        },
    ))
}
