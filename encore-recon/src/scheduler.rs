//! Cron scheduler for reconciliation jobs
//!
//! An explicit component owned by the composition root (no process-wide
//! singletons): jobs are registered with a cron expression and timezone,
//! `start()` spawns one task per job that sleeps until the next occurrence,
//! and the returned handle stops all schedules on shutdown. An in-flight
//! run is not interrupted (batches are bounded and transactional); only
//! future firings stop.

use crate::reconcile::ReconcileJob;
use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule;
use encore_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A job bound to its recurring trigger
struct JobSchedule {
    schedule: Schedule,
    timezone: Tz,
    job: Arc<dyn ReconcileJob>,
    /// Overlap guard, shared across every trigger of the same job name; a
    /// firing that finds it held is skipped
    running: Arc<AtomicBool>,
}

/// Reconciliation job scheduler
pub struct ReconcileScheduler {
    pool: SqlitePool,
    jobs: Vec<JobSchedule>,
    guards: HashMap<&'static str, Arc<AtomicBool>>,
}

impl ReconcileScheduler {
    /// Create new scheduler over the shared connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            jobs: Vec::new(),
            guards: HashMap::new(),
        }
    }

    /// Register a job on a recurring trigger.
    ///
    /// The cron expression uses the 6-field format (seconds first), e.g.
    /// `0 0 2 * * *` for daily at 02:00, evaluated in `timezone`.
    ///
    /// # Errors
    /// [`Error::Config`] if the cron expression or timezone does not parse.
    pub fn register(
        &mut self,
        cron_expr: &str,
        timezone: &str,
        job: Arc<dyn ReconcileJob>,
    ) -> Result<()> {
        let schedule = Schedule::from_str(cron_expr).map_err(|e| {
            Error::Config(format!("invalid cron expression '{}': {}", cron_expr, e))
        })?;
        let tz: Tz = timezone
            .parse()
            .map_err(|_| Error::Config(format!("invalid timezone '{}'", timezone)))?;

        info!(
            job = job.name(),
            cron = cron_expr,
            timezone,
            "Registered reconciliation job"
        );

        let running = self
            .guards
            .entry(job.name())
            .or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone();

        self.jobs.push(JobSchedule {
            schedule,
            timezone: tz,
            job,
            running,
        });

        Ok(())
    }

    /// Number of registered jobs
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Start all schedules in background tasks.
    ///
    /// Call when the process is ready; stop with
    /// [`SchedulerHandle::shutdown`].
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tasks = self
            .jobs
            .into_iter()
            .map(|entry| {
                let pool = self.pool.clone();
                let shutdown_rx = shutdown_rx.clone();
                tokio::spawn(run_schedule(pool, entry, shutdown_rx))
            })
            .collect();

        SchedulerHandle { shutdown_tx, tasks }
    }
}

/// Running scheduler; dropping it without calling [`shutdown`] leaves the
/// schedule tasks detached.
///
/// [`shutdown`]: SchedulerHandle::shutdown
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop all schedules and wait for their tasks to finish.
    ///
    /// An in-flight job run completes; only future firings are cancelled.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("Reconciliation scheduler stopped");
    }
}

/// Per-job schedule loop: sleep until the next cron occurrence, fire, repeat.
async fn run_schedule(pool: SqlitePool, entry: JobSchedule, mut shutdown_rx: watch::Receiver<bool>) {
    info!(job = entry.job.name(), "Reconciliation schedule started");

    loop {
        let now = Utc::now().with_timezone(&entry.timezone);
        let Some(next) = entry.schedule.after(&now).next() else {
            warn!(
                job = entry.job.name(),
                "Cron schedule has no future occurrences, stopping"
            );
            break;
        };

        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        debug!(
            job = entry.job.name(),
            next = %next,
            "Sleeping until next scheduled run"
        );

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                fire(&pool, &entry).await;
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!(job = entry.job.name(), "Reconciliation schedule stopped");
                    break;
                }
            }
        }
    }
}

/// Run one firing of a job, honoring the overlap guard.
async fn fire(pool: &SqlitePool, entry: &JobSchedule) {
    if entry.running.swap(true, Ordering::SeqCst) {
        warn!(
            job = entry.job.name(),
            "Previous run still in progress, skipping this firing"
        );
        return;
    }

    let run_id = Uuid::new_v4();
    let started = Instant::now();
    info!(job = entry.job.name(), run_id = %run_id, "Reconciliation run starting");

    match entry.job.run(pool).await {
        Ok(stats) => {
            info!(
                job = entry.job.name(),
                run_id = %run_id,
                scanned = stats.scanned,
                repaired = stats.repaired,
                batches = stats.batches,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Reconciliation run complete"
            );
        }
        Err(e) => {
            // Contained to this run; the schedule keeps firing
            error!(
                job = entry.job.name(),
                run_id = %run_id,
                error = %e,
                "Reconciliation run failed"
            );
        }
    }

    entry.running.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::RunStats;
    use async_trait::async_trait;

    struct NoopJob;

    #[async_trait]
    impl ReconcileJob for NoopJob {
        fn name(&self) -> &'static str {
            "noop"
        }

        async fn run(&self, _pool: &SqlitePool) -> Result<RunStats> {
            Ok(RunStats::default())
        }
    }

    async fn test_pool() -> SqlitePool {
        sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_accepts_valid_schedule() {
        let mut scheduler = ReconcileScheduler::new(test_pool().await);
        scheduler
            .register("0 0 2 * * *", "Asia/Seoul", Arc::new(NoopJob))
            .unwrap();
        assert_eq!(scheduler.job_count(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_cron() {
        let mut scheduler = ReconcileScheduler::new(test_pool().await);
        let result = scheduler.register("not a cron", "Asia/Seoul", Arc::new(NoopJob));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_timezone() {
        let mut scheduler = ReconcileScheduler::new(test_pool().await);
        let result = scheduler.register("0 0 2 * * *", "Mars/Olympus_Mons", Arc::new(NoopJob));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
