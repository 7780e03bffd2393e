//! Review mutation path
//!
//! The user-facing create/update/delete operations for reviews. Each
//! operation runs in one transaction: child-row mutation, keyword link
//! upkeep, then the club aggregate refresh, so no committed state ever shows
//! a review without its aggregates (or vice versa). Ownership is enforced
//! before any write.
//!
//! Keyword summary rows are also projected here opportunistically
//! (`INSERT OR IGNORE`); the reconciliation job remains the authority for
//! that table.

use crate::aggregate::{refresh_club_aggregates, MutationKind};
use encore_common::{Error, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

/// Partial update for a review; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct ReviewPatch {
    pub rating: Option<i64>,
    pub content: Option<String>,
    /// Replaces the full keyword set when present
    pub keyword_ids: Option<Vec<i64>>,
}

/// Review Service
///
/// Owns the transactional mutation path for reviews and their keyword links.
pub struct ReviewService {
    db: SqlitePool,
}

impl ReviewService {
    /// Create new review service
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a review and refresh the club's aggregates in one transaction.
    ///
    /// Returns the new review id.
    ///
    /// # Errors
    /// [`Error::NotFound`] if the club does not exist;
    /// [`Error::InvalidInput`] if the rating is outside 1..=5.
    pub async fn create_review(
        &self,
        club_id: i64,
        user_id: i64,
        rating: i64,
        content: Option<&str>,
        keyword_ids: &[i64],
    ) -> Result<i64> {
        validate_rating(rating)?;

        let mut tx = self.db.begin().await?;

        let club: Option<(i64,)> = sqlx::query_as("SELECT id FROM clubs WHERE id = ?")
            .bind(club_id)
            .fetch_optional(&mut *tx)
            .await?;
        if club.is_none() {
            return Err(Error::NotFound(format!("club {} not found", club_id)));
        }

        let review_id = sqlx::query(
            r#"
            INSERT INTO reviews (club_id, user_id, rating, content, created_at, updated_at)
            VALUES (?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            "#,
        )
        .bind(club_id)
        .bind(user_id)
        .bind(rating)
        .bind(content)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        link_keywords(&mut tx, club_id, review_id, keyword_ids).await?;

        refresh_club_aggregates(&mut tx, club_id, MutationKind::Created).await?;

        tx.commit().await?;

        info!(review_id, club_id, user_id, rating, "Created review");

        Ok(review_id)
    }

    /// Apply a partial update to a review the user owns.
    ///
    /// The aggregate recompute only happens when the rating actually changed;
    /// content-only edits skip it.
    ///
    /// # Errors
    /// [`Error::NotFound`] if the review does not exist;
    /// [`Error::Forbidden`] if `user_id` does not own it (checked before any
    /// write).
    pub async fn update_review(
        &self,
        review_id: i64,
        user_id: i64,
        patch: ReviewPatch,
    ) -> Result<()> {
        if let Some(rating) = patch.rating {
            validate_rating(rating)?;
        }

        let mut tx = self.db.begin().await?;

        let (club_id, old_rating) = load_owned_review(&mut tx, review_id, user_id).await?;

        sqlx::query(
            r#"
            UPDATE reviews
            SET rating = COALESCE(?, rating),
                content = COALESCE(?, content),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(patch.rating)
        .bind(patch.content.as_deref())
        .bind(review_id)
        .execute(&mut *tx)
        .await?;

        if let Some(keyword_ids) = &patch.keyword_ids {
            sqlx::query("DELETE FROM review_keywords WHERE review_id = ?")
                .bind(review_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM keyword_summaries WHERE review_id = ?")
                .bind(review_id)
                .execute(&mut *tx)
                .await?;
            link_keywords(&mut tx, club_id, review_id, keyword_ids).await?;
        }

        let rating_changed = patch.rating.is_some_and(|r| r != old_rating);
        refresh_club_aggregates(&mut tx, club_id, MutationKind::Updated { rating_changed })
            .await?;

        tx.commit().await?;

        info!(review_id, user_id, rating_changed, "Updated review");

        Ok(())
    }

    /// Delete a review the user owns and refresh the club's aggregates.
    ///
    /// Keyword links, likes, and summary rows cascade with the review row.
    /// Deleting the club's last review leaves `avg_rating = 0,
    /// review_cnt = 0`.
    pub async fn delete_review(&self, review_id: i64, user_id: i64) -> Result<()> {
        let mut tx = self.db.begin().await?;

        let (club_id, _) = load_owned_review(&mut tx, review_id, user_id).await?;

        sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(review_id)
            .execute(&mut *tx)
            .await?;

        refresh_club_aggregates(&mut tx, club_id, MutationKind::Deleted).await?;

        tx.commit().await?;

        info!(review_id, user_id, club_id, "Deleted review");

        Ok(())
    }
}

/// Load `(club_id, rating)` for a review after checking ownership.
async fn load_owned_review(
    tx: &mut Transaction<'_, Sqlite>,
    review_id: i64,
    user_id: i64,
) -> Result<(i64, i64)> {
    let row: Option<(i64, i64, i64)> =
        sqlx::query_as("SELECT club_id, user_id, rating FROM reviews WHERE id = ?")
            .bind(review_id)
            .fetch_optional(&mut **tx)
            .await?;

    let (club_id, owner_id, rating) = row.ok_or_else(|| {
        Error::NotFound(format!("review {} not found", review_id))
    })?;

    if owner_id != user_id {
        return Err(Error::Forbidden(format!(
            "review {} belongs to user {}, not user {}",
            review_id, owner_id, user_id
        )));
    }

    Ok((club_id, rating))
}

/// Insert keyword link rows and their opportunistic summary projections.
async fn link_keywords(
    tx: &mut Transaction<'_, Sqlite>,
    club_id: i64,
    review_id: i64,
    keyword_ids: &[i64],
) -> Result<()> {
    for keyword_id in keyword_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO review_keywords (review_id, keyword_id) VALUES (?, ?)",
        )
        .bind(review_id)
        .bind(keyword_id)
        .execute(&mut **tx)
        .await?;

        // Write-time projection; reconciliation repairs any row this misses
        sqlx::query(
            "INSERT OR IGNORE INTO keyword_summaries (club_id, review_id, keyword_id) VALUES (?, ?, ?)",
        )
        .bind(club_id)
        .bind(review_id)
        .bind(keyword_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn validate_rating(rating: i64) -> Result<()> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "rating must be between 1 and 5, got {}",
            rating
        )))
    }
}
