//! Common error types for Encore

use thiserror::Error;

/// Common result type for Encore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the Encore services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Caller does not own the record it tried to modify
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A toggle produced neither an insert nor a delete
    #[error("Consistency violation: {0}")]
    Consistency(String),

    /// One reconciliation batch failed; the run aborts without skipping data
    #[error("Reconciliation batch failed (job: {job}, cursor > {cursor}): {source}")]
    Batch {
        job: &'static str,
        cursor: i64,
        #[source]
        source: Box<Error>,
    },

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap a batch-scoped failure with the job name and the cursor the
    /// failing scan page started after.
    pub fn batch(job: &'static str, cursor: i64, source: Error) -> Self {
        Error::Batch {
            job,
            cursor,
            source: Box::new(source),
        }
    }
}
