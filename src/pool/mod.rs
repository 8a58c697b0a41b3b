//! Parallel writer pool engine.
//!
//! A single coordinator task owns the pending queue, the active worker count,
//! and the stats aggregate. Job bodies run on isolated blocking contexts via
//! [`tokio::task::spawn_blocking`]; a panic inside a job surfaces as a join
//! error and is handled like any other worker crash, so one bad job can never
//! corrupt the pool's own state. Workers communicate back through one-shot
//! completion futures only, never shared mutable memory.
//!
//! # Dispatch
//!
//! Jobs dispatch in submission order but may complete out of order
//! (first-available-worker policy). `pump` runs after every submit and after
//! every completion: while there is worker capacity and pending work, the head
//! job is claimed and dispatched.
//!
//! # Retry
//!
//! A failed job is classified against the writer pool pattern table. Transient
//! failures sleep out an exponential backoff (capped at 10s, plus up to 500ms
//! of jitter) and rejoin the tail of the queue; jobs waiting out a backoff
//! still count toward the pool's depth, so `drain` does not resolve under
//! them. Permanent failures are recorded in the bounded validation-issue list
//! and never retried.

pub mod job;
pub mod stats;

pub use job::{Job, JobFailure, JobOutput, JobRunner};
pub use stats::{MAX_RETAINED_ISSUES, PoolStats, ValidationIssue};

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::classify::classify_job_error;
use crate::config::WriterPoolConfig;
use crate::emit;
use crate::error::PoolError;
use crate::metrics::events::{
    ActiveWorkers, JobCompleted, JobDuration, JobFailed, JobRetried, PendingJobs,
};

/// Interval at which `drain` re-checks the pool depth.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Future type for in-flight workers: the job comes back with its outcome so
/// a transient failure can be resubmitted.
type WorkerFuture =
    Pin<Box<dyn Future<Output = (Job, Result<JobOutput, JobFailure>, Duration)> + Send>>;

/// Future type for jobs sleeping out a retry backoff.
type RetryFuture = Pin<Box<dyn Future<Output = Job> + Send>>;

enum Command {
    Submit(Job),
    Stats(oneshot::Sender<PoolStats>),
    Depth(oneshot::Sender<usize>),
}

/// Handle to a running writer pool.
pub struct WriterPool {
    cmd_tx: mpsc::UnboundedSender<Command>,
    handle: JoinHandle<PoolStats>,
    config: WriterPoolConfig,
}

impl WriterPool {
    /// Spawn the pool coordinator.
    pub fn spawn(config: WriterPoolConfig, runner: Arc<dyn JobRunner>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(Coordinator::new(config.clone(), runner).run(cmd_rx));

        Self {
            cmd_tx,
            handle,
            config,
        }
    }

    /// Build a job stamped with this pool's chunk size and compression level.
    pub fn build_job(
        &self,
        job_type: impl Into<String>,
        file_path: impl Into<std::path::PathBuf>,
        records: Vec<bytes::Bytes>,
    ) -> Job {
        Job::new(
            job_type,
            file_path,
            records,
            self.config.chunk_size,
            self.config.compression_level,
        )
    }

    /// Append a job to the tail of the pending queue. Never blocks.
    pub fn submit(&self, job: Job) -> Result<(), PoolError> {
        self.cmd_tx
            .send(Command::Submit(job))
            .map_err(|_| PoolError::PoolClosed)
    }

    /// Snapshot the pool's running statistics.
    pub async fn stats(&self) -> Result<PoolStats, PoolError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Stats(tx))
            .map_err(|_| PoolError::PoolClosed)?;
        rx.await.map_err(|_| PoolError::PoolClosed)
    }

    /// Queued plus active plus retry-scheduled work. The query rides the same
    /// channel as submissions, so it always reflects every prior `submit` on
    /// this handle. Reports zero once the pool is finalized.
    pub async fn depth(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Depth(tx)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Resolve once the pending queue and the active worker set are both
    /// empty. Polls at a short fixed interval rather than busy-spinning.
    pub async fn drain(&self) {
        loop {
            if self.depth().await == 0 {
                return;
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }

    /// Stop accepting work, drain in-flight jobs, and return final stats.
    pub async fn finalize(self) -> Result<PoolStats, PoolError> {
        drop(self.cmd_tx);
        self.handle
            .await
            .map_err(|source| PoolError::CoordinatorJoin { source })
    }
}

/// Coordinator state; owned by a single task, mutated nowhere else.
struct Coordinator {
    config: WriterPoolConfig,
    runner: Arc<dyn JobRunner>,
    pending: VecDeque<Job>,
    active: usize,
    stats: PoolStats,
    workers: FuturesUnordered<WorkerFuture>,
    retries: FuturesUnordered<RetryFuture>,
    label: &'static str,
}

impl Coordinator {
    fn new(config: WriterPoolConfig, runner: Arc<dyn JobRunner>) -> Self {
        let label = config.kind.as_str();
        Self {
            config,
            runner,
            pending: VecDeque::new(),
            active: 0,
            stats: PoolStats::default(),
            workers: FuturesUnordered::new(),
            retries: FuturesUnordered::new(),
            label,
        }
    }

    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) -> PoolStats {
        let mut closed = false;

        loop {
            if closed && self.pending.is_empty() && self.active == 0 && self.retries.is_empty() {
                break;
            }

            tokio::select! {
                biased;

                // Completions first, to free worker slots before taking more work.
                Some((job, result, elapsed)) = self.workers.next(), if self.active > 0 => {
                    self.active -= 1;
                    self.on_worker_done(job, result, elapsed);
                    self.pump();
                }

                Some(job) = self.retries.next(), if !self.retries.is_empty() => {
                    debug!(
                        target = self.label,
                        path = %job.file_path.display(),
                        attempt = job.attempt,
                        "Backoff elapsed, resubmitting job"
                    );
                    self.pending.push_back(job);
                    self.pump();
                }

                cmd = cmd_rx.recv(), if !closed => {
                    match cmd {
                        Some(Command::Submit(job)) => {
                            self.stats.total_jobs += 1;
                            self.pending.push_back(job);
                            self.pump();
                        }
                        Some(Command::Stats(reply)) => {
                            let _ = reply.send(self.stats.clone());
                        }
                        Some(Command::Depth(reply)) => {
                            let _ = reply.send(self.depth());
                        }
                        None => {
                            let remaining = self.pending.len() + self.active;
                            debug!(
                                target = self.label,
                                remaining,
                                "Submissions closed, draining remaining jobs"
                            );
                            closed = true;
                        }
                    }
                }
            }

            self.publish_depth();
        }

        emit!(ActiveWorkers {
            count: 0,
            target: self.label.to_string(),
        });
        self.stats
    }

    /// Claim and dispatch head jobs while capacity allows.
    fn pump(&mut self) {
        while self.active < self.config.max_workers
            && let Some(job) = self.pending.pop_front()
        {
            self.active += 1;
            emit!(ActiveWorkers {
                count: self.active,
                target: self.label.to_string(),
            });

            debug!(
                target = self.label,
                path = %job.file_path.display(),
                active = self.active,
                max = self.config.max_workers,
                "Dispatching job"
            );

            let runner = Arc::clone(&self.runner);
            let worker_job = job.clone();
            let handle = tokio::task::spawn_blocking(move || runner.run(&worker_job));

            self.workers.push(Box::pin(async move {
                let started = Instant::now();
                let result = match handle.await {
                    Ok(tagged) => tagged,
                    // No tagged result from the worker: implicit crash.
                    Err(e) if e.is_panic() => {
                        Err(JobFailure::new("worker crashed without reporting a result"))
                    }
                    Err(_) => Err(JobFailure::new("worker cancelled")),
                };
                (job, result, started.elapsed())
            }));
        }
    }

    fn on_worker_done(
        &mut self,
        mut job: Job,
        result: Result<JobOutput, JobFailure>,
        elapsed: Duration,
    ) {
        emit!(JobDuration {
            duration: elapsed,
            target: self.label.to_string(),
        });
        emit!(ActiveWorkers {
            count: self.active,
            target: self.label.to_string(),
        });

        match result {
            Ok(output) => {
                self.stats.merge_completed(
                    output.original_bytes,
                    output.compressed_bytes,
                    output.record_count,
                );
                emit!(JobCompleted {
                    original_bytes: output.original_bytes,
                    compressed_bytes: output.compressed_bytes,
                    records: output.record_count,
                    target: self.label.to_string(),
                });
                debug!(
                    target = self.label,
                    path = %job.file_path.display(),
                    records = output.record_count,
                    compressed = output.compressed_bytes,
                    "Job completed"
                );
            }
            Err(failure) => {
                let class = classify_job_error(&failure.message);
                if class.is_retryable() && self.config.retry.attempts_remaining(job.attempt) {
                    let delay = self.config.retry.delay(job.attempt);
                    job.attempt += 1;
                    warn!(
                        target = self.label,
                        path = %job.file_path.display(),
                        error = %failure,
                        attempt = job.attempt,
                        delay_ms = delay.as_millis(),
                        "Transient job failure, retrying after backoff"
                    );
                    emit!(JobRetried {
                        attempt: job.attempt,
                        target: self.label.to_string(),
                    });
                    self.retries.push(Box::pin(async move {
                        tokio::time::sleep(delay).await;
                        job
                    }));
                } else {
                    warn!(
                        target = self.label,
                        path = %job.file_path.display(),
                        error = %failure,
                        attempts = job.attempt,
                        "Permanent job failure"
                    );
                    self.stats
                        .record_failure(&job.file_path, vec![failure.message]);
                    emit!(JobFailed {
                        target: self.label.to_string(),
                    });
                }
            }
        }
    }

    /// Queued plus active plus retry-scheduled work. Jobs sleeping out a
    /// backoff are counted so drain cannot resolve under them.
    fn depth(&self) -> usize {
        self.pending.len() + self.active + self.retries.len()
    }

    fn publish_depth(&self) {
        emit!(PendingJobs {
            count: self.pending.len() + self.retries.len(),
            target: self.label.to_string(),
        });
    }
}
