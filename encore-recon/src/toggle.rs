//! Membership toggles (favorite, attendance, like)
//!
//! Flips a binary membership relation and reports the resulting state. All
//! relations share one primitive: a conflict-tolerant insert guarded by the
//! relation's unique key, followed by a conditional delete when the insert
//! hit the constraint, both inside a single write transaction. The first
//! statement is the insert, so concurrent identical callers serialize on the
//! store's write lock and the at-most-one-row invariant holds; application
//! code never does an unguarded check-then-act.

use encore_common::{Error, Result};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

/// A toggleable relation table and its key pair columns
#[derive(Debug, Clone, Copy)]
struct RelationSpec {
    table: &'static str,
    subject_col: &'static str,
    object_col: &'static str,
}

const FAVORITES: RelationSpec = RelationSpec {
    table: "favorites",
    subject_col: "user_id",
    object_col: "club_id",
};

const ATTENDANCES: RelationSpec = RelationSpec {
    table: "attendances",
    subject_col: "user_id",
    object_col: "performance_id",
};

const REVIEW_LIKES: RelationSpec = RelationSpec {
    table: "review_likes",
    subject_col: "user_id",
    object_col: "review_id",
};

/// Toggle a club favorite. Returns `true` if the club is now favorited.
pub async fn toggle_favorite(pool: &SqlitePool, user_id: i64, club_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let now_on = toggle_in_tx(&mut tx, FAVORITES, user_id, club_id).await?;
    tx.commit().await?;

    debug!(user_id, club_id, now_on, "Toggled favorite");
    Ok(now_on)
}

/// Toggle attendance for a performance. Returns `true` if the user is now
/// attending.
pub async fn toggle_attendance(
    pool: &SqlitePool,
    user_id: i64,
    performance_id: i64,
) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let now_on = toggle_in_tx(&mut tx, ATTENDANCES, user_id, performance_id).await?;
    tx.commit().await?;

    debug!(user_id, performance_id, now_on, "Toggled attendance");
    Ok(now_on)
}

/// Toggle a like on a review and adjust the review's denormalized
/// `like_count` in the same transaction. Returns `true` if the review is now
/// liked by the user.
///
/// # Errors
/// [`Error::NotFound`] if the review vanished between the relation write and
/// the counter write (the whole transaction rolls back).
pub async fn toggle_like(pool: &SqlitePool, user_id: i64, review_id: i64) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let now_on = toggle_in_tx(&mut tx, REVIEW_LIKES, user_id, review_id).await?;

    let counter_sql = if now_on {
        "UPDATE reviews SET like_count = like_count + 1 WHERE id = ?"
    } else {
        "UPDATE reviews SET like_count = MAX(like_count - 1, 0) WHERE id = ?"
    };
    let updated = sqlx::query(counter_sql)
        .bind(review_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if updated == 0 {
        return Err(Error::NotFound(format!(
            "review {} disappeared during like toggle",
            review_id
        )));
    }

    tx.commit().await?;

    debug!(user_id, review_id, now_on, "Toggled review like");
    Ok(now_on)
}

/// Number of users currently favoriting a club.
///
/// Favorite counts are derived on demand, never stored, so there is no
/// counter to keep consistent for this relation.
pub async fn count_favorites(pool: &SqlitePool, club_id: i64) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM favorites WHERE club_id = ?")
        .bind(club_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// The shared primitive: insert-or-delete behind the unique constraint.
///
/// Returns `true` when the insert landed (relation now on), `false` when the
/// conflicting row was deleted instead (relation now off).
///
/// # Errors
/// [`Error::Consistency`] if neither branch affected a row; with the unique
/// constraint in place that state is unreachable, so it is surfaced loudly
/// instead of returning an ambiguous result.
async fn toggle_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    relation: RelationSpec,
    subject_id: i64,
    object_id: i64,
) -> Result<bool> {
    let insert_sql = format!(
        "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?, ?)",
        relation.table, relation.subject_col, relation.object_col
    );
    let inserted = sqlx::query(&insert_sql)
        .bind(subject_id)
        .bind(object_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

    if inserted == 1 {
        return Ok(true);
    }

    let delete_sql = format!(
        "DELETE FROM {} WHERE {} = ? AND {} = ?",
        relation.table, relation.subject_col, relation.object_col
    );
    let deleted = sqlx::query(&delete_sql)
        .bind(subject_id)
        .bind(object_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();

    if deleted == 1 {
        Ok(false)
    } else {
        Err(Error::Consistency(format!(
            "toggle on {} affected neither branch for ({}, {})",
            relation.table, subject_id, object_id
        )))
    }
}
