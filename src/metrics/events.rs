//! Internal events for floe metrics emission.
//!
//! Each event struct represents a measurable occurrence in the pipeline core.
//! Events implement the `InternalEvent` trait which emits the corresponding
//! metric through the `metrics` facade.
//!
//! ## Target Labels
//!
//! Pool and upload metrics include a `target` label so binary and parquet
//! instantiations (and multiple pipelines) stay distinguishable.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

// ============================================================================
// Writer pool events
// ============================================================================

/// Event emitted when a writer job completes successfully.
pub struct JobCompleted {
    pub original_bytes: u64,
    pub compressed_bytes: u64,
    pub records: u64,
    /// Pool label ("binary", "parquet").
    pub target: String,
}

impl InternalEvent for JobCompleted {
    fn emit(self) {
        trace!(
            original = self.original_bytes,
            compressed = self.compressed_bytes,
            records = self.records,
            target = %self.target,
            "Job completed"
        );
        counter!("floe_jobs_completed_total", "target" => self.target.clone()).increment(1);
        counter!("floe_records_written_total", "target" => self.target.clone())
            .increment(self.records);
        counter!("floe_original_bytes_total", "target" => self.target.clone())
            .increment(self.original_bytes);
        counter!("floe_compressed_bytes_total", "target" => self.target)
            .increment(self.compressed_bytes);
    }
}

/// Event emitted when a writer job fails permanently.
pub struct JobFailed {
    /// Pool label ("binary", "parquet").
    pub target: String,
}

impl InternalEvent for JobFailed {
    fn emit(self) {
        trace!(target = %self.target, "Job failed");
        counter!("floe_jobs_failed_total", "target" => self.target).increment(1);
    }
}

/// Event emitted when a transiently failed job is rescheduled.
pub struct JobRetried {
    pub attempt: u32,
    /// Pool label ("binary", "parquet").
    pub target: String,
}

impl InternalEvent for JobRetried {
    fn emit(self) {
        trace!(attempt = self.attempt, target = %self.target, "Job retried");
        counter!("floe_job_retries_total", "target" => self.target).increment(1);
    }
}

/// Event emitted when a writer job finishes, carrying its wall-clock duration.
pub struct JobDuration {
    pub duration: Duration,
    /// Pool label ("binary", "parquet").
    pub target: String,
}

impl InternalEvent for JobDuration {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            target = %self.target,
            "Job duration"
        );
        histogram!("floe_job_duration_seconds", "target" => self.target)
            .record(self.duration.as_secs_f64());
    }
}

/// Event emitted when the number of active workers changes.
pub struct ActiveWorkers {
    pub count: usize,
    /// Pool label ("binary", "parquet").
    pub target: String,
}

impl InternalEvent for ActiveWorkers {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Active workers");
        gauge!("floe_active_workers", "target" => self.target).set(self.count as f64);
    }
}

/// Event emitted when the pending job queue depth changes.
///
/// Includes jobs waiting out a retry backoff; they are still work the pool
/// owes before it can report drained.
pub struct PendingJobs {
    pub count: usize,
    /// Pool label ("binary", "parquet").
    pub target: String,
}

impl InternalEvent for PendingJobs {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Pending jobs");
        gauge!("floe_pending_jobs", "target" => self.target).set(self.count as f64);
    }
}

// ============================================================================
// Upload queue events
// ============================================================================

/// Event emitted when an upload completes successfully.
pub struct UploadCompleted {
    pub bytes: u64,
    pub target: String,
}

impl InternalEvent for UploadCompleted {
    fn emit(self) {
        trace!(bytes = self.bytes, target = %self.target, "Upload completed");
        counter!("floe_uploads_completed_total", "target" => self.target.clone()).increment(1);
        counter!("floe_bytes_uploaded_total", "target" => self.target).increment(self.bytes);
    }
}

/// Event emitted when an upload fails permanently.
pub struct UploadFailed {
    pub target: String,
}

impl InternalEvent for UploadFailed {
    fn emit(self) {
        trace!(target = %self.target, "Upload failed");
        counter!("floe_uploads_failed_total", "target" => self.target).increment(1);
    }
}

/// Event emitted before a transiently failed upload is retried in place.
pub struct UploadRetried {
    pub attempt: u32,
    pub target: String,
}

impl InternalEvent for UploadRetried {
    fn emit(self) {
        trace!(attempt = self.attempt, target = %self.target, "Upload retried");
        counter!("floe_upload_retries_total", "target" => self.target).increment(1);
    }
}

/// Event emitted when an upload attempt finishes, carrying its duration.
pub struct UploadDuration {
    pub duration: Duration,
    pub target: String,
}

impl InternalEvent for UploadDuration {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            target = %self.target,
            "Upload duration"
        );
        histogram!("floe_upload_duration_seconds", "target" => self.target)
            .record(self.duration.as_secs_f64());
    }
}

/// Event emitted when the number of active uploads changes.
pub struct ActiveUploads {
    pub count: usize,
    pub target: String,
}

impl InternalEvent for ActiveUploads {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Active uploads");
        gauge!("floe_active_uploads", "target" => self.target).set(self.count as f64);
    }
}

/// Event emitted when the upload queue depth (queued + active) changes.
pub struct UploadQueueDepth {
    pub count: usize,
    pub target: String,
}

impl InternalEvent for UploadQueueDepth {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Upload queue depth");
        gauge!("floe_upload_queue_depth", "target" => self.target).set(self.count as f64);
    }
}

/// Event emitted on every hysteresis pause/resume transition.
pub struct UploadQueuePaused {
    pub paused: bool,
    pub target: String,
}

impl InternalEvent for UploadQueuePaused {
    fn emit(self) {
        trace!(paused = self.paused, target = %self.target, "Upload queue pause transition");
        gauge!("floe_upload_queue_paused", "target" => self.target.clone())
            .set(if self.paused { 1.0 } else { 0.0 });
        let transition = if self.paused { "pause" } else { "resume" };
        counter!(
            "floe_upload_queue_transitions_total",
            "transition" => transition,
            "target" => self.target
        )
        .increment(1);
    }
}

// ============================================================================
// Cursor events
// ============================================================================

/// Event emitted when a cursor is durably persisted.
pub struct CursorSaved {
    pub target: String,
}

impl InternalEvent for CursorSaved {
    fn emit(self) {
        trace!(target = %self.target, "Cursor saved");
        counter!("floe_cursor_saves_total", "target" => self.target).increment(1);
    }
}
