//! Asynchronous upload queue with hysteresis backpressure.
//!
//! A single coordinator task owns the queue, the active-transfer count, and
//! the pause flag; handles talk to it over channels only. Transfers run as
//! spawned futures bounded by the concurrency limit, reporting back through
//! one-shot completions, mirroring the writer pool's dispatch shape.
//!
//! # Hysteresis
//!
//! `is_paused` becomes true only when `queue.len() + active >= high_water` and
//! false only when that sum drops to `low_water` or below. Between the marks
//! the flag holds its prior value, so producers are never toggled on every
//! item.
//!
//! # Retry
//!
//! Transient transfer failures retry *in place* inside their transfer future:
//! the item keeps its queue position for peak-tracking purposes (it is active,
//! not re-enqueued) and the backoff wait is a real timer suspension, never a
//! busy loop. Permanent failures are counted, retained in a bounded recent
//! list, and dropped.

pub mod transfer;

pub use transfer::{LocalCopyTransfer, Transfer, TransferError};

use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::classify::classify_upload_error;
use crate::config::UploadQueueConfig;
use crate::emit;
use crate::error::UploadError;
use crate::metrics::events::{
    ActiveUploads, UploadCompleted, UploadDuration, UploadFailed, UploadQueueDepth,
    UploadQueuePaused, UploadRetried,
};

/// Interval at which `drain` re-checks the queue depth.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Cap on retained permanent-failure records.
const MAX_RETAINED_FAILURES: usize = 10;

/// One finished artifact awaiting upload.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub local_path: PathBuf,
    pub remote_path: String,
    /// Retry attempts consumed so far.
    pub attempt: u32,
}

impl UploadItem {
    pub fn new(local_path: impl Into<PathBuf>, remote_path: impl Into<String>) -> Self {
        Self {
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            attempt: 0,
        }
    }
}

/// A permanently failed upload retained for operator visibility.
#[derive(Debug, Clone)]
pub struct FailedUpload {
    pub remote_path: String,
    pub error: String,
}

/// Aggregate statistics for one queue instance.
#[derive(Debug, Clone)]
pub struct UploadStats {
    pub bytes_uploaded: u64,
    pub uploads_completed: u64,
    pub uploads_failed: u64,
    pub peak_queue_size: usize,
    pub started_at: Instant,
    /// Up to [`MAX_RETAINED_FAILURES`] permanent failures.
    pub recent_failures: Vec<FailedUpload>,
}

impl Default for UploadStats {
    fn default() -> Self {
        Self {
            bytes_uploaded: 0,
            uploads_completed: 0,
            uploads_failed: 0,
            peak_queue_size: 0,
            started_at: Instant::now(),
            recent_failures: Vec::new(),
        }
    }
}

type TransferFuture = Pin<Box<dyn Future<Output = (UploadItem, Result<u64, String>)> + Send>>;

enum Command {
    Enqueue(UploadItem, oneshot::Sender<Result<(), UploadError>>),
    Stats(oneshot::Sender<UploadStats>),
    Shutdown(oneshot::Sender<UploadStats>),
}

/// Handle to a running upload queue.
pub struct UploadQueue {
    cmd_tx: mpsc::UnboundedSender<Command>,
    pause_rx: watch::Receiver<bool>,
    depth_rx: watch::Receiver<usize>,
}

impl UploadQueue {
    /// Spawn the queue coordinator.
    pub fn spawn(
        config: UploadQueueConfig,
        transfer: Arc<dyn Transfer>,
        label: impl Into<String>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (pause_tx, pause_rx) = watch::channel(false);
        let (depth_tx, depth_rx) = watch::channel(0usize);

        tokio::spawn(
            QueueCoordinator::new(config, transfer, pause_tx, depth_tx, label.into()).run(cmd_rx),
        );

        Self {
            cmd_tx,
            pause_rx,
            depth_rx,
        }
    }

    /// Queue an item for upload.
    ///
    /// Returns a rejection (never panics) once shutdown has begun.
    pub async fn enqueue(&self, item: UploadItem) -> Result<(), UploadError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Enqueue(item, tx))
            .map_err(|_| UploadError::QueueClosed)?;
        rx.await.map_err(|_| UploadError::QueueClosed)?
    }

    /// Current hysteresis pause flag.
    pub fn should_pause(&self) -> bool {
        *self.pause_rx.borrow()
    }

    /// Queued plus active transfers.
    pub fn queue_depth(&self) -> usize {
        *self.depth_rx.borrow()
    }

    /// Snapshot the queue's running statistics.
    pub async fn stats(&self) -> Result<UploadStats, UploadError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Stats(tx))
            .map_err(|_| UploadError::QueueClosed)?;
        rx.await.map_err(|_| UploadError::QueueClosed)
    }

    /// Resolve once the queue and the active-transfer set are both empty.
    /// Polls at a short fixed interval rather than busy-spinning.
    pub async fn drain(&self) {
        loop {
            if *self.depth_rx.borrow() == 0 {
                return;
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }

    /// Reject further enqueues, wait for in-flight work, return final stats.
    pub async fn shutdown(self) -> Result<UploadStats, UploadError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown(tx))
            .map_err(|_| UploadError::QueueClosed)?;
        rx.await.map_err(|_| UploadError::QueueClosed)
    }
}

/// Coordinator state; owned by a single task, mutated nowhere else.
struct QueueCoordinator {
    config: UploadQueueConfig,
    transfer: Arc<dyn Transfer>,
    queue: VecDeque<UploadItem>,
    active: usize,
    is_paused: bool,
    is_shutting_down: bool,
    stats: UploadStats,
    transfers: FuturesUnordered<TransferFuture>,
    pause_tx: watch::Sender<bool>,
    depth_tx: watch::Sender<usize>,
    label: String,
}

impl QueueCoordinator {
    fn new(
        config: UploadQueueConfig,
        transfer: Arc<dyn Transfer>,
        pause_tx: watch::Sender<bool>,
        depth_tx: watch::Sender<usize>,
        label: String,
    ) -> Self {
        Self {
            config,
            transfer,
            queue: VecDeque::new(),
            active: 0,
            is_paused: false,
            is_shutting_down: false,
            stats: UploadStats::default(),
            transfers: FuturesUnordered::new(),
            pause_tx,
            depth_tx,
            label,
        }
    }

    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Command>) {
        let mut closed = false;
        let mut shutdown_reply: Option<oneshot::Sender<UploadStats>> = None;

        loop {
            if self.queue.is_empty() && self.active == 0 {
                if let Some(reply) = shutdown_reply.take() {
                    info!(target = %self.label, "Upload queue drained, shutdown complete");
                    let _ = reply.send(self.stats.clone());
                }
                if closed {
                    break;
                }
            }

            tokio::select! {
                biased;

                // Completions first, to free transfer slots before taking more work.
                Some((item, result)) = self.transfers.next(), if self.active > 0 => {
                    self.active -= 1;
                    self.on_transfer_done(item, result);
                    self.reevaluate_pause();
                    self.dispatch();
                }

                cmd = cmd_rx.recv(), if !closed => {
                    match cmd {
                        Some(Command::Enqueue(item, reply)) => {
                            let _ = reply.send(self.on_enqueue(item));
                        }
                        Some(Command::Stats(reply)) => {
                            let _ = reply.send(self.stats.clone());
                        }
                        Some(Command::Shutdown(reply)) => {
                            debug!(
                                target = %self.label,
                                remaining = self.queue.len() + self.active,
                                "Shutdown requested, rejecting further enqueues"
                            );
                            self.is_shutting_down = true;
                            shutdown_reply = Some(reply);
                        }
                        None => {
                            closed = true;
                        }
                    }
                }
            }

            self.publish_depth();
        }
    }

    fn on_enqueue(&mut self, item: UploadItem) -> Result<(), UploadError> {
        if self.is_shutting_down {
            return Err(UploadError::ShuttingDown);
        }

        self.queue.push_back(item);
        let depth = self.queue.len() + self.active;
        self.stats.peak_queue_size = self.stats.peak_queue_size.max(depth);
        self.reevaluate_pause();
        self.dispatch();
        // Publish before the caller's ack fires, so a depth read immediately
        // after an awaited enqueue already counts this item.
        self.publish_depth();
        Ok(())
    }

    /// Pop and start head items while under the concurrency limit.
    fn dispatch(&mut self) {
        while self.active < self.config.max_concurrent
            && let Some(item) = self.queue.pop_front()
        {
            self.active += 1;
            emit!(ActiveUploads {
                count: self.active,
                target: self.label.clone(),
            });

            debug!(
                target = %self.label,
                remote = %item.remote_path,
                active = self.active,
                max = self.config.max_concurrent,
                "Starting upload"
            );

            let transfer = Arc::clone(&self.transfer);
            let retry = self.config.retry;
            let label = self.label.clone();
            self.transfers
                .push(Box::pin(run_transfer(transfer, item, retry, label)));
        }
    }

    fn on_transfer_done(&mut self, item: UploadItem, result: Result<u64, String>) {
        emit!(ActiveUploads {
            count: self.active,
            target: self.label.clone(),
        });

        match result {
            Ok(bytes) => {
                self.stats.uploads_completed += 1;
                self.stats.bytes_uploaded += bytes;
                emit!(UploadCompleted {
                    bytes,
                    target: self.label.clone(),
                });
                info!(
                    target = %self.label,
                    remote = %item.remote_path,
                    bytes,
                    "Uploaded artifact"
                );
            }
            Err(error) => {
                self.stats.uploads_failed += 1;
                if self.stats.recent_failures.len() < MAX_RETAINED_FAILURES {
                    self.stats.recent_failures.push(FailedUpload {
                        remote_path: item.remote_path.clone(),
                        error: error.clone(),
                    });
                }
                emit!(UploadFailed {
                    target: self.label.clone(),
                });
                warn!(
                    target = %self.label,
                    remote = %item.remote_path,
                    error = %error,
                    attempts = item.attempt,
                    "Upload failed permanently"
                );
            }
        }
    }

    /// Apply the hysteresis rule to the current depth.
    fn reevaluate_pause(&mut self) {
        let depth = self.queue.len() + self.active;
        if !self.is_paused && depth >= self.config.high_water {
            self.is_paused = true;
            info!(
                target = %self.label,
                depth,
                high_water = self.config.high_water,
                "Upload queue paused"
            );
            emit!(UploadQueuePaused {
                paused: true,
                target: self.label.clone(),
            });
            let _ = self.pause_tx.send(true);
        } else if self.is_paused && depth <= self.config.low_water {
            self.is_paused = false;
            info!(
                target = %self.label,
                depth,
                low_water = self.config.low_water,
                "Upload queue resumed"
            );
            emit!(UploadQueuePaused {
                paused: false,
                target: self.label.clone(),
            });
            let _ = self.pause_tx.send(false);
        }
    }

    fn publish_depth(&self) {
        let depth = self.queue.len() + self.active;
        let _ = self.depth_tx.send(depth);
        emit!(UploadQueueDepth {
            count: depth,
            target: self.label.clone(),
        });
    }
}

/// Run one item's transfer, retrying transient failures in place.
async fn run_transfer(
    transfer: Arc<dyn Transfer>,
    mut item: UploadItem,
    retry: BackoffPolicy,
    label: String,
) -> (UploadItem, Result<u64, String>) {
    loop {
        let started = Instant::now();
        let attempt_result = transfer.transfer(&item.local_path, &item.remote_path).await;
        emit!(UploadDuration {
            duration: started.elapsed(),
            target: label.clone(),
        });

        match attempt_result {
            Ok(bytes) => return (item, Ok(bytes)),
            Err(e) => {
                let class = classify_upload_error(&e.message);
                if class.is_retryable() && retry.attempts_remaining(item.attempt) {
                    let delay = retry.delay(item.attempt);
                    item.attempt += 1;
                    warn!(
                        target = %label,
                        remote = %item.remote_path,
                        error = %e,
                        attempt = item.attempt,
                        delay_ms = delay.as_millis(),
                        "Transient upload failure, retrying after backoff"
                    );
                    emit!(UploadRetried {
                        attempt: item.attempt,
                        target: label.clone(),
                    });
                    // Timer suspension, not a spin; CPU stays idle while waiting.
                    tokio::time::sleep(delay).await;
                } else {
                    return (item, Err(e.message));
                }
            }
        }
    }
}
