//! Club aggregate maintenance
//!
//! Recomputes a club's denormalized rating aggregates (`avg_rating`,
//! `review_cnt`) from its current reviews and writes them back inside the
//! caller's transaction. The caller mutates the child row first, then calls
//! [`refresh_club_aggregates`] before commit, so the child mutation and the
//! aggregate rewrite succeed or fail together.

use encore_common::{Error, Result};
use sqlx::{Sqlite, Transaction};
use tracing::debug;

/// The kind of review mutation that was just applied in this transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// A review was inserted
    Created,
    /// A review was updated; `rating_changed` is false for content-only edits
    Updated { rating_changed: bool },
    /// A review was deleted
    Deleted,
}

impl MutationKind {
    /// Content-only edits leave the aggregates untouched
    fn requires_recompute(self) -> bool {
        !matches!(
            self,
            MutationKind::Updated {
                rating_changed: false
            }
        )
    }
}

/// Recompute `avg_rating` and `review_cnt` over the club's current reviews
/// and write both fields to the club row, inside the caller's transaction.
///
/// A club with no reviews gets `avg_rating = 0, review_cnt = 0`, never NULL.
/// Exactly one write to the club row per invocation; there are no retries
/// here. Failure propagates so the caller's whole transaction rolls back.
///
/// # Errors
/// [`Error::NotFound`] if the club row no longer exists (deleted by a
/// concurrent transaction).
pub async fn refresh_club_aggregates(
    tx: &mut Transaction<'_, Sqlite>,
    club_id: i64,
    kind: MutationKind,
) -> Result<()> {
    if !kind.requires_recompute() {
        debug!(club_id, "Content-only review edit, skipping aggregate recompute");
        return Ok(());
    }

    let (review_cnt, avg_rating): (i64, f64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(AVG(rating), 0.0) FROM reviews WHERE club_id = ?",
    )
    .bind(club_id)
    .fetch_one(&mut **tx)
    .await?;

    let updated = sqlx::query(
        r#"
        UPDATE clubs
        SET avg_rating = ?, review_cnt = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(avg_rating)
    .bind(review_cnt)
    .bind(club_id)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(Error::NotFound(format!(
            "club {} disappeared during aggregate refresh",
            club_id
        )));
    }

    debug!(club_id, avg_rating, review_cnt, "Refreshed club aggregates");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_only_update_skips_recompute() {
        assert!(!MutationKind::Updated {
            rating_changed: false
        }
        .requires_recompute());
    }

    #[test]
    fn test_other_mutations_recompute() {
        assert!(MutationKind::Created.requires_recompute());
        assert!(MutationKind::Updated {
            rating_changed: true
        }
        .requires_recompute());
        assert!(MutationKind::Deleted.requires_recompute());
    }
}
