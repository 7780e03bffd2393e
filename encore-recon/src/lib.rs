//! encore-recon library - Aggregate consistency & reconciliation engine
//!
//! Keeps the denormalized read-path fields of the Encore database (club
//! rating aggregates, review like counters, keyword summaries) consistent
//! with their source-of-truth tables:
//!
//! - [`aggregate`] rewrites a club's rating aggregates in the same
//!   transaction as any review mutation.
//! - [`reviews`] is the transactional review mutation path that drives it.
//! - [`toggle`] flips membership relations (favorite, attendance, like)
//!   race-free behind their unique constraints.
//! - [`reconcile`] repairs drift in the denormalized tables with bounded,
//!   idempotent keyset-paginated batch jobs.
//! - [`scheduler`] fires those jobs on a cron schedule and ties them to
//!   process lifecycle.

pub mod aggregate;
pub mod reconcile;
pub mod reviews;
pub mod scheduler;
pub mod toggle;
