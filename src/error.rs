//! Error types for the floe resilience core.
//!
//! Durability failures (cursor writes) are always fatal to the caller of the
//! write. Job and upload failures are recovered locally up to the retry budget
//! and only escalate when exhausted or permanent.

use snafu::prelude::*;

/// Errors that can occur during cursor persistence.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CursorError {
    /// Atomic write failed at some stage (temp write, fsync, backup, rename).
    ///
    /// The temp file has already been cleaned up; the previous cursor value
    /// (if any) is untouched on disk.
    #[snafu(display("atomic cursor write failed at {path}: {source}"))]
    AtomicWrite {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize the cursor record.
    #[snafu(display("Failed to serialize cursor record: {source}"))]
    Serialize { source: serde_json::Error },

    /// Unexpected I/O error while reading the cursor file.
    ///
    /// "Not found" is never reported through this variant; a missing or
    /// corrupt cursor reads as `None`.
    #[snafu(display("Failed to read cursor file {path}: {source}"))]
    Read {
        path: String,
        source: std::io::Error,
    },
}

/// Errors that can occur during configuration resolution.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// An environment override was present but unparseable.
    #[snafu(display("Invalid value {value:?} for override {name}"))]
    InvalidOverride { name: String, value: String },

    /// Water marks must satisfy high > low for hysteresis to work.
    #[snafu(display("High water mark ({high}) must be greater than low water mark ({low})"))]
    InvalidWaterMarks { high: usize, low: usize },

    /// Worker and transfer concurrency must be at least 1; a zero-capacity
    /// coordinator can never make progress.
    #[snafu(display("{name} must be at least 1"))]
    ZeroConcurrency { name: &'static str },
}

/// Errors that can occur in the writer pool.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PoolError {
    /// The pool coordinator has shut down and no longer accepts jobs.
    #[snafu(display("Writer pool is closed"))]
    PoolClosed,

    /// The pool coordinator task failed to join.
    #[snafu(display("Writer pool coordinator panicked: {source}"))]
    CoordinatorJoin { source: tokio::task::JoinError },
}

/// Errors that can occur in the upload queue.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum UploadError {
    /// Enqueue was rejected because the queue is shutting down.
    #[snafu(display("Upload queue is shutting down, enqueue rejected"))]
    ShuttingDown,

    /// The queue coordinator has exited and no longer answers.
    #[snafu(display("Upload queue is closed"))]
    QueueClosed,
}

/// Top-level pipeline errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Cursor persistence error.
    #[snafu(display("Cursor error: {source}"))]
    Cursor { source: CursorError },

    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Writer pool error.
    #[snafu(display("Pool error: {source}"))]
    Pool { source: PoolError },

    /// Upload queue error.
    #[snafu(display("Upload error: {source}"))]
    Upload { source: UploadError },
}

impl From<CursorError> for PipelineError {
    fn from(source: CursorError) -> Self {
        PipelineError::Cursor { source }
    }
}

impl From<ConfigError> for PipelineError {
    fn from(source: ConfigError) -> Self {
        PipelineError::Config { source }
    }
}

impl From<PoolError> for PipelineError {
    fn from(source: PoolError) -> Self {
        PipelineError::Pool { source }
    }
}

impl From<UploadError> for PipelineError {
    fn from(source: UploadError) -> Self {
        PipelineError::Upload { source }
    }
}
