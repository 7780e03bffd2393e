//! Integration tests for the membership toggles
//!
//! The toggle primitive must flip the relation and report the resulting
//! state, and concurrent identical calls must never leave more than one
//! relation row.

mod helpers;

use encore_recon::toggle::{count_favorites, toggle_attendance, toggle_favorite, toggle_like};
use helpers::{
    seed_club, seed_performance, seed_user, setup_test_db, setup_test_db_file,
};

#[tokio::test]
async fn test_favorite_toggle_alternates() {
    let pool = setup_test_db().await;
    let club_id = seed_club(&pool, "Club").await;
    let user_id = seed_user(&pool, "user").await;

    assert!(toggle_favorite(&pool, user_id, club_id).await.unwrap());
    assert!(!toggle_favorite(&pool, user_id, club_id).await.unwrap());
    assert!(toggle_favorite(&pool, user_id, club_id).await.unwrap());

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM favorites WHERE user_id = ? AND club_id = ?")
            .bind(user_id)
            .bind(club_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_attendance_toggle_alternates() {
    let pool = setup_test_db().await;
    let club_id = seed_club(&pool, "Club").await;
    let performance_id = seed_performance(&pool, club_id, "Friday Night").await;
    let user_id = seed_user(&pool, "user").await;

    assert!(toggle_attendance(&pool, user_id, performance_id)
        .await
        .unwrap());
    assert!(!toggle_attendance(&pool, user_id, performance_id)
        .await
        .unwrap());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendances")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_toggles_are_independent_per_user() {
    let pool = setup_test_db().await;
    let club_id = seed_club(&pool, "Club").await;
    let user_a = seed_user(&pool, "user-a").await;
    let user_b = seed_user(&pool, "user-b").await;

    assert!(toggle_favorite(&pool, user_a, club_id).await.unwrap());
    assert!(toggle_favorite(&pool, user_b, club_id).await.unwrap());
    assert_eq!(count_favorites(&pool, club_id).await.unwrap(), 2);

    assert!(!toggle_favorite(&pool, user_a, club_id).await.unwrap());
    assert_eq!(count_favorites(&pool, club_id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_like_toggle_maintains_counter() {
    let pool = setup_test_db().await;
    let club_id = seed_club(&pool, "Club").await;
    let author = seed_user(&pool, "author").await;
    let fan = seed_user(&pool, "fan").await;
    let service = encore_recon::reviews::ReviewService::new(pool.clone());

    let review_id = service
        .create_review(club_id, author, 5, None, &[])
        .await
        .unwrap();

    assert!(toggle_like(&pool, fan, review_id).await.unwrap());
    let review = encore_common::db::load_review(&pool, review_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(review.like_count, 1);

    assert!(!toggle_like(&pool, fan, review_id).await.unwrap());
    let review = encore_common::db::load_review(&pool, review_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(review.like_count, 0);
}

#[tokio::test]
async fn test_unlike_never_drives_counter_negative() {
    let pool = setup_test_db().await;
    let club_id = seed_club(&pool, "Club").await;
    let author = seed_user(&pool, "author").await;
    let fan = seed_user(&pool, "fan").await;
    let service = encore_recon::reviews::ReviewService::new(pool.clone());

    let review_id = service
        .create_review(club_id, author, 5, None, &[])
        .await
        .unwrap();

    // Like, then plant a drifted (too-low) counter before unliking
    toggle_like(&pool, fan, review_id).await.unwrap();
    sqlx::query("UPDATE reviews SET like_count = 0 WHERE id = ?")
        .bind(review_id)
        .execute(&pool)
        .await
        .unwrap();

    toggle_like(&pool, fan, review_id).await.unwrap();

    let review = encore_common::db::load_review(&pool, review_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(review.like_count, 0);
}

/// Concurrent identical attendance toggles for the same (user, performance)
/// pair must serialize: never more than one relation row, and the returned
/// booleans alternate consistently with the final row state.
#[tokio::test]
async fn test_concurrent_attendance_toggles_serialize() {
    let (_dir, pool) = setup_test_db_file(8).await;
    let club_id = seed_club(&pool, "Club").await;
    let performance_id = seed_performance(&pool, club_id, "Saturday Late").await;
    let user_id = seed_user(&pool, "user").await;

    const TOGGLES: usize = 8;
    let mut handles = Vec::new();
    for _ in 0..TOGGLES {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            toggle_attendance(&pool, user_id, performance_id).await
        }));
    }

    let mut now_on = 0i64;
    let mut now_off = 0i64;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            true => now_on += 1,
            false => now_off += 1,
        }
    }

    let rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM attendances WHERE user_id = ? AND performance_id = ?",
    )
    .bind(user_id)
    .bind(performance_id)
    .fetch_one(&pool)
    .await
    .unwrap();

    // At most one row, ever
    assert!(rows <= 1);
    // Each `true` inserted a row, each `false` deleted one
    assert_eq!(now_on - now_off, rows);
    // Serialized toggles strictly alternate from the empty state
    assert_eq!(now_on, 4);
    assert_eq!(now_off, 4);
    assert_eq!(rows, 0);
}
