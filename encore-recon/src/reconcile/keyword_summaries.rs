//! Keyword-summary reconciliation
//!
//! Projects `review_keywords` link rows into the `keyword_summaries` table.
//! Each batch computes the set of `(review_id, keyword_id)` pairs already
//! present in the summary table, subtracts it from the pairs implied by the
//! scanned links, and inserts only the missing rows. Inserts are
//! conflict-tolerant, so a pair repaired by an earlier run (or written
//! opportunistically at review time) is a silent no-op.

use super::{KeysetScan, ReconcileJob, RunStats, ScanStep};
use async_trait::async_trait;
use encore_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, warn};

/// Keyword-summary reconciliation job
pub struct KeywordSummaryJob {
    batch_size: i64,
}

impl KeywordSummaryJob {
    pub fn new(batch_size: i64) -> Self {
        Self { batch_size }
    }

    /// Scan one page of link rows and insert the summary rows it is missing.
    ///
    /// Returns `(last_id, scanned, repaired)` for the page.
    async fn process_batch(
        &self,
        pool: &SqlitePool,
        cursor: i64,
    ) -> Result<(Option<i64>, u64, u64)> {
        // link id, review id, keyword id, club id
        let links: Vec<(i64, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT rk.id, rk.review_id, rk.keyword_id, r.club_id
            FROM review_keywords rk
            JOIN reviews r ON r.id = rk.review_id
            WHERE rk.id > ?
            ORDER BY rk.id
            LIMIT ?
            "#,
        )
        .bind(cursor)
        .bind(self.batch_size)
        .fetch_all(pool)
        .await?;

        let last_id = links.last().map(|&(id, _, _, _)| id);
        let scanned = links.len() as u64;

        if links.is_empty() {
            return Ok((last_id, scanned, 0));
        }

        let existing = self.existing_pairs(pool, &links).await?;

        let missing: Vec<&(i64, i64, i64, i64)> = links
            .iter()
            .filter(|(_, review_id, keyword_id, _)| {
                !existing.contains(&(*review_id, *keyword_id))
            })
            .collect();

        if !missing.is_empty() {
            let mut tx = pool.begin().await?;
            for &&(_, review_id, keyword_id, club_id) in &missing {
                sqlx::query(
                    "INSERT OR IGNORE INTO keyword_summaries (club_id, review_id, keyword_id) VALUES (?, ?, ?)",
                )
                .bind(club_id)
                .bind(review_id)
                .bind(keyword_id)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;

            debug!(
                cursor,
                inserted = missing.len(),
                "Inserted missing keyword summary rows"
            );
        }

        Ok((last_id, scanned, missing.len() as u64))
    }

    /// `(review_id, keyword_id)` pairs already present in the summary table
    /// for the reviews covered by this batch.
    async fn existing_pairs(
        &self,
        pool: &SqlitePool,
        links: &[(i64, i64, i64, i64)],
    ) -> Result<HashSet<(i64, i64)>> {
        let review_ids: BTreeSet<i64> = links.iter().map(|&(_, review_id, _, _)| review_id).collect();

        let placeholders = vec!["?"; review_ids.len()].join(", ");
        let sql = format!(
            "SELECT review_id, keyword_id FROM keyword_summaries WHERE review_id IN ({})",
            placeholders
        );

        let mut query = sqlx::query_as::<_, (i64, i64)>(&sql);
        for review_id in &review_ids {
            query = query.bind(*review_id);
        }

        let rows = query.fetch_all(pool).await?;
        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl ReconcileJob for KeywordSummaryJob {
    fn name(&self) -> &'static str {
        "keyword_summaries"
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
