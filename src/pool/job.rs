//! Writer pool job types.
//!
//! A job is a unit of work: an ordered batch of records destined for one
//! compressed artifact on local disk. The actual encode/compress body is
//! supplied by the caller through [`JobRunner`]; the pool owns scheduling,
//! isolation, retry, and accounting only.

use std::path::PathBuf;

use bytes::Bytes;

/// A unit of work submitted to the writer pool.
///
/// Created by the caller, queued, claimed by exactly one worker, and
/// terminates in completed or failed. Chunk size and compression level are
/// attached at submission time rather than read by the worker, so a config
/// change mid-run never splits a job's settings.
#[derive(Debug, Clone)]
pub struct Job {
    /// Record type tag, e.g. "updates" or "events".
    pub job_type: String,
    /// Destination artifact path on local disk.
    pub file_path: PathBuf,
    /// Ordered records to encode.
    pub records: Vec<Bytes>,
    /// Chunk size for the encoder.
    pub chunk_size: usize,
    /// Compression level for the codec.
    pub compression_level: i32,
    /// Retry attempts consumed so far.
    pub attempt: u32,
}

impl Job {
    /// Create a job with explicit settings.
    pub fn new(
        job_type: impl Into<String>,
        file_path: impl Into<PathBuf>,
        records: Vec<Bytes>,
        chunk_size: usize,
        compression_level: i32,
    ) -> Self {
        Self {
            job_type: job_type.into(),
            file_path: file_path.into(),
            records,
            chunk_size,
            compression_level,
            attempt: 0,
        }
    }
}

/// Outcome of a successfully completed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOutput {
    /// Bytes of input consumed.
    pub original_bytes: u64,
    /// Bytes written to the artifact after compression.
    pub compressed_bytes: u64,
    /// Records written.
    pub record_count: u64,
}

/// A tagged failure produced by a worker.
///
/// A worker that terminates without producing either a [`JobOutput`] or a
/// `JobFailure` (a panic or abort) is treated as an implicit crash failure.
#[derive(Debug, Clone)]
pub struct JobFailure {
    /// Failure message, classified against the writer pool pattern table.
    pub message: String,
}

impl JobFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Job body supplied by the caller: encodes and compresses one job's records.
///
/// Runs on an isolated blocking context; a panic inside `run` is contained by
/// the pool and reported as a worker crash, never corrupting pool state.
pub trait JobRunner: Send + Sync + 'static {
    fn run(&self, job: &Job) -> Result<JobOutput, JobFailure>;
}
