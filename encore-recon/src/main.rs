//! encore-recon - Aggregate reconciliation service entry point
//!
//! Composition root: loads configuration, opens the database, registers the
//! reconciliation jobs on the cron scheduler, and ties the scheduler to
//! process lifecycle (started on readiness, stopped on Ctrl+C/SIGTERM).
//! `--run-job` executes a single job immediately and exits, for manual
//! repair passes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use encore_common::config::Config;
use encore_common::db::init_database;
use encore_recon::reconcile::{KeywordSummaryJob, LikeCountJob, ReconcileJob};
use encore_recon::scheduler::ReconcileScheduler;

/// Command-line arguments for encore-recon
#[derive(Parser, Debug)]
#[command(name = "encore-recon")]
#[command(about = "Aggregate reconciliation service for Encore")]
#[command(version)]
struct Args {
    /// Path to the SQLite database file
    #[arg(short, long, env = "ENCORE_DATABASE")]
    database: Option<PathBuf>,

    /// Path to the TOML config file
    #[arg(short, long, env = "ENCORE_CONFIG")]
    config: Option<PathBuf>,

    /// Run a single reconciliation job immediately and exit
    /// (like_counts | keyword_summaries)
    #[arg(long, value_name = "JOB")]
    run_job: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encore_recon=info,encore_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting Encore reconciliation service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::load(args.config.as_deref(), args.database.as_deref())
        .context("Failed to load configuration")?;
    info!("Database path: {}", config.database_path.display());

    let pool = init_database(&config.database_path, config.reconcile.busy_timeout_ms)
        .await
        .context("Failed to initialize database")?;

    let like_counts = Arc::new(LikeCountJob::new(config.reconcile.like_count_batch_size));
    let keyword_summaries = Arc::new(KeywordSummaryJob::new(
        config.reconcile.keyword_summary_batch_size,
    ));

    // Manual one-shot run, then exit
    if let Some(name) = args.run_job.as_deref() {
        let job: Arc<dyn ReconcileJob> = match name {
            "like_counts" => like_counts,
            "keyword_summaries" => keyword_summaries,
            other => bail!(
                "Unknown job '{}' (expected like_counts or keyword_summaries)",
                other
            ),
        };

        let stats = job.run(&pool).await?;
        info!(
            job = job.name(),
            scanned = stats.scanned,
            repaired = stats.repaired,
            batches = stats.batches,
            "Manual reconciliation run complete"
        );
        return Ok(());
    }

    let mut scheduler = ReconcileScheduler::new(pool.clone());
    scheduler.register(
        &config.reconcile.cron,
        &config.reconcile.timezone,
        like_counts,
    )?;
    scheduler.register(
        &config.reconcile.cron,
        &config.reconcile.timezone,
        keyword_summaries,
    )?;

    let handle = scheduler.start();
    info!(
        cron = %config.reconcile.cron,
        timezone = %config.reconcile.timezone,
        "Scheduler started"
    );

    shutdown_signal().await;

    handle.shutdown().await;
    info!("Shutdown complete");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
