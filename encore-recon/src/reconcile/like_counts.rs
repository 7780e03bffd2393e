//! Like-count reconciliation
//!
//! Compares each review's stored `like_count` against a fresh count of its
//! `review_likes` rows and rewrites only the counters that drifted. One
//! transaction per batch bounds lock duration while keeping completed
//! batches durable if a later one fails.

use super::{KeysetScan, ReconcileJob, RunStats, ScanStep};
use async_trait::async_trait;
use encore_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{debug, warn};

/// Like-count reconciliation job
pub struct LikeCountJob {
    batch_size: i64,
}

impl LikeCountJob {
    pub fn new(batch_size: i64) -> Self {
        Self { batch_size }
    }

    /// Scan one page and repair its drifted counters.
    ///
    /// Returns `(last_id, scanned, repaired)` for the page.
    async fn process_batch(
        &self,
        pool: &SqlitePool,
        cursor: i64,
    ) -> Result<(Option<i64>, u64, u64)> {
        let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT r.id, r.like_count,
                   (SELECT COUNT(*) FROM review_likes l WHERE l.review_id = r.id)
            FROM reviews r
            WHERE r.id > ?
            ORDER BY r.id
            LIMIT ?
            "#,
        )
        .bind(cursor)
        .bind(self.batch_size)
        .fetch_all(pool)
        .await?;

        let last_id = rows.last().map(|&(id, _, _)| id);
        let scanned = rows.len() as u64;

        let drifted: Vec<(i64, i64)> = rows
            .iter()
            .filter(|&&(_, stored, actual)| stored != actual)
            .map(|&(id, _, actual)| (id, actual))
            .collect();

        if !drifted.is_empty() {
            let mut tx = pool.begin().await?;
            for &(review_id, actual) in &drifted {
                sqlx::query("UPDATE reviews SET like_count = ? WHERE id = ?")
                    .bind(actual)
                    .bind(review_id)
                    .execute(&mut *tx)
                    .await?;
            }
            tx.commit().await?;

            debug!(
                cursor,
                repaired = drifted.len(),
                "Repaired drifted like counters"
            );
        }

        Ok((last_id, scanned, drifted.len() as u64))
    }
}

#[async_trait]
impl ReconcileJob for LikeCountJob {
    fn name(&self) -> &'static str {
        "like_counts"
    }

    async fn run(&self, pool: &SqlitePool) -> Result<RunStats> {
        let mut scan = KeysetScan::new();
        let mut stats = RunStats::default();

        loop {
            let cursor = scan.cursor();
            let (last_id, scanned, repaired) = self
                .process_batch(pool, cursor)
                .await
                .map_err(|e| Error::batch(self.name(), cursor, e))?;

            stats.scanned += scanned;
            stats.repaired += repaired;

            match scan.advance(last_id) {
                ScanStep::Continue => stats.batches += 1,
                ScanStep::Done => break,
                ScanStep::Stalled => {
                    warn!(
                        job = self.name(),
                        cursor, "Scan cursor did not advance, stopping run"
                    );
                    break;
                }
            }
        }

        Ok(stats)
    }
}
