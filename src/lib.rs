//! floe: resilience core for local-to-cloud ingestion pipelines.
//!
//! Three tightly coupled subsystems form a single flow-control loop:
//!
//! - `cursor/` - Crash-safe checkpoint persistence for ingestion progress
//! - `pool/` - Parallel writer pool turning record batches into compressed files
//! - `upload/` - Asynchronous upload queue with hysteresis backpressure
//!
//! The writer pool cannot outrun disk, the ingestion buffer cannot outrun the
//! upload queue, and a crash at any point resumes from a durable cursor.
//!
//! Supporting modules:
//!
//! - `backpressure` - The single cross-subsystem synchronization point
//! - `classify` - Data-driven transient/permanent error classification
//! - `backoff` - Exponential backoff with jitter for retries
//! - `config` - Environment override resolution for pool and queue tuning
//! - `metrics/` - Internal event types emitted through the `metrics` facade
//! - `error` - Error types per subsystem

pub mod backoff;
pub mod backpressure;
pub mod classify;
pub mod config;
pub mod cursor;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod upload;

// Re-export commonly used items
pub use backoff::{BackoffPolicy, Jitter};
pub use backpressure::wait_for_upload_capacity;
pub use classify::{ErrorClass, classify_job_error, classify_upload_error};
pub use config::{PoolKind, UploadQueueConfig, WriterPoolConfig};
pub use cursor::{CursorRecord, CursorStore};
pub use error::{ConfigError, CursorError, PipelineError, PoolError, UploadError};
pub use pool::{Job, JobOutput, JobRunner, PoolStats, WriterPool};
pub use upload::{
    LocalCopyTransfer, Transfer, TransferError, UploadItem, UploadQueue, UploadStats,
};
