//! Background reconciliation jobs
//!
//! Each job scans a source-of-truth table in keyset-paginated batches
//! (primary key strictly greater than the last-seen key, ascending), diffs
//! the denormalized projection against it, and repairs only the rows that
//! actually differ. Repairs are idempotent (recomputed values,
//! conflict-tolerant inserts), so every run starts from cursor 0 and a
//! re-scan of already-repaired rows is a no-op.
//!
//! A failure inside one batch aborts the run (no skipping ahead past
//! unprocessed data) and is reported as [`encore_common::Error::Batch`] with
//! the failing cursor; the scheduler logs it and the next firing starts a
//! fresh run.

pub mod keyword_summaries;
pub mod like_counts;

pub use keyword_summaries::KeywordSummaryJob;
pub use like_counts::LikeCountJob;

use async_trait::async_trait;
use encore_common::Result;
use sqlx::SqlitePool;

/// A reconciliation job that can be fired by the scheduler or run manually
#[async_trait]
pub trait ReconcileJob: Send + Sync {
    /// Stable job name used in logs and the manual-run CLI
    fn name(&self) -> &'static str;

    /// Execute one full pass over the source table
    async fn run(&self, pool: &SqlitePool) -> Result<RunStats>;
}

/// Counters for one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Source rows scanned
    pub scanned: u64,
    /// Rows repaired (updated counters or inserted summary rows)
    pub repaired: u64,
    /// Non-empty batches processed
    pub batches: u64,
}

/// Keyset pagination cursor
///
/// Pages are read with `id > cursor ORDER BY id LIMIT n`, so concurrent
/// inserts and deletes never cause a row to be skipped or reprocessed within
/// a run, and memory stays bounded regardless of table size.
#[derive(Debug, Clone, Copy)]
pub struct KeysetScan {
    cursor: i64,
}

/// Outcome of advancing the cursor past one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    /// More pages may follow
    Continue,
    /// The page was empty; the scan is complete
    Done,
    /// The page was non-empty but the cursor did not advance; the scan must
    /// stop rather than loop forever
    Stalled,
}

impl KeysetScan {
    pub fn new() -> Self {
        Self { cursor: 0 }
    }

    /// The key the next page starts after
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    /// Advance past a page whose last row id was `last_id` (`None` for an
    /// empty page).
    pub fn advance(&mut self, last_id: Option<i64>) -> ScanStep {
        match last_id {
            None => ScanStep::Done,
            Some(id) if id <= self.cursor => ScanStep::Stalled,
            Some(id) => {
                self.cursor = id;
                ScanStep::Continue
            }
        }
    }
}

impl Default for KeysetScan {
    fn default() -> Self {
        Self::new()
    }
}
