//! Worker pool that runs one fetch-and-write task per chunk.
//!
//! A fixed number of workers pull jobs from one bounded queue in submission
//! order. Each job is retried according to the pool's [`RetryPolicy`]; the
//! first job to give up records its error in the [`FailureSlot`] and cancels
//! the pool, after which queued jobs are skipped and in-flight jobs stop
//! before their next attempt.
//!
//! # Example
//!
//! ```
//! use chunky_core::download::{RetryPolicy, WorkerPool};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), chunky_core::DownloadError> {
//! let pool = WorkerPool::new(4, RetryPolicy::new(2), &CancellationToken::new())?;
//! for index in 0..8 {
//!     pool.submit(index, move || async move {
//!         println!("chunk {index}");
//!         Ok(())
//!     })
//!     .await?;
//! }
//! pool.wait().await?;
//! # Ok(())
//! # }
//! ```

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::constants::MAX_PARALLELISM;
use super::error::DownloadError;
use super::retry::{RetryDecision, RetryPolicy};

type TaskFn = Box<dyn FnMut() -> BoxFuture<'static, Result<(), DownloadError>> + Send>;

struct Job {
    index: usize,
    task: TaskFn,
}

/// Terminal state of one submitted job.
#[derive(Debug)]
pub enum TaskOutcome {
    /// An attempt completed without error.
    Succeeded,
    /// Every allowed attempt failed; carries the exhaustion error.
    Failed(DownloadError),
    /// The pool was cancelled before the next attempt could start.
    Aborted,
}

/// Holds the first terminal error of a pool run.
///
/// Only the first [`record`](Self::record) is kept; later ones are dropped.
#[derive(Debug, Default)]
pub struct FailureSlot {
    error: Mutex<Option<DownloadError>>,
}

impl FailureSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `error` if the slot is empty. Returns true if it was stored.
    pub fn record(&self, error: DownloadError) -> bool {
        let mut slot = self.error.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(error);
        true
    }

    /// Returns true once an error has been recorded.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Removes and returns the recorded error.
    pub fn take(&self) -> Option<DownloadError> {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Counters collected while the pool runs.
#[derive(Debug, Default)]
pub struct PoolStats {
    attempts: AtomicUsize,
    retried: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl PoolStats {
    /// Total attempts started, first tries and retries alike.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Attempts that were retries of a failed attempt.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    /// Jobs that finished successfully.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    /// Jobs that exhausted their attempts.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Jobs that never ran, or stopped before a retry, due to cancellation.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    fn record(&self, outcome: &TaskOutcome) {
        let counter = match outcome {
            TaskOutcome::Succeeded => &self.succeeded,
            TaskOutcome::Failed(_) => &self.failed,
            TaskOutcome::Aborted => &self.skipped,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

struct Shared {
    policy: RetryPolicy,
    cancel: CancellationToken,
    failure: FailureSlot,
    stats: Arc<PoolStats>,
}

/// Bounded-parallelism executor for chunk tasks.
pub struct WorkerPool {
    sender: mpsc::Sender<Job>,
    receiver: Arc<AsyncMutex<mpsc::Receiver<Job>>>,
    workers: JoinSet<()>,
    shared: Arc<Shared>,
    submitted: AtomicUsize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("submitted", &self.submitted.load(Ordering::SeqCst))
            .field("cancelled", &self.shared.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl WorkerPool {
    /// Starts `parallelism` workers.
    ///
    /// The pool cancels a child of `parent`, so a failure inside the pool never
    /// cancels the caller's token, while cancelling `parent` stops the pool.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidInput`] if `parallelism` is zero or
    /// above the supported maximum.
    pub fn new(
        parallelism: usize,
        policy: RetryPolicy,
        parent: &CancellationToken,
    ) -> Result<Self, DownloadError> {
        if parallelism == 0 || parallelism > MAX_PARALLELISM {
            return Err(DownloadError::invalid_input(format!(
                "parallelism must be between 1 and {MAX_PARALLELISM}, got {parallelism}"
            )));
        }

        let (sender, receiver) = mpsc::channel(parallelism);
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let shared = Arc::new(Shared {
            policy,
            cancel: parent.child_token(),
            failure: FailureSlot::new(),
            stats: Arc::new(PoolStats::default()),
        });

        let mut workers = JoinSet::new();
        for worker in 0..parallelism {
            workers.spawn(worker_loop(
                worker,
                Arc::clone(&receiver),
                Arc::clone(&shared),
            ));
        }
        debug!(parallelism, "worker pool started");

        Ok(Self {
            sender,
            receiver,
            workers,
            shared,
            submitted: AtomicUsize::new(0),
        })
    }

    /// Shared counters, readable while the pool runs and after [`wait`](Self::wait).
    #[must_use]
    pub fn stats(&self) -> Arc<PoolStats> {
        Arc::clone(&self.shared.stats)
    }

    /// Returns true once the pool has been cancelled by failure or by its parent.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Queues a job for chunk `index`.
    ///
    /// `task` is called once per attempt. Waits for queue space, but never
    /// past cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::SubmissionCancelled`] if the pool is cancelled
    /// before or while waiting for space.
    pub async fn submit<F, Fut>(&self, index: usize, mut task: F) -> Result<(), DownloadError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), DownloadError>> + Send + 'static,
    {
        if self.shared.cancel.is_cancelled() {
            return Err(DownloadError::SubmissionCancelled);
        }

        let job = Job {
            index,
            task: Box::new(move || task().boxed()),
        };

        tokio::select! {
            biased;
            () = self.shared.cancel.cancelled() => Err(DownloadError::SubmissionCancelled),
            sent = self.sender.send(job) => match sent {
                Ok(()) => {
                    self.submitted.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                // Every worker is gone, which only happens after cancellation.
                Err(_) => Err(DownloadError::SubmissionCancelled),
            },
        }
    }

    /// Closes the queue and waits for every job and worker to finish.
    ///
    /// # Errors
    ///
    /// Returns the first recorded error: a [`DownloadError::RetriesExhausted`]
    /// for the first job that gave up, [`DownloadError::WorkerPanicked`], or
    /// [`DownloadError::Cancelled`] if the pool was cancelled from outside
    /// before every job succeeded.
    #[instrument(level = "debug", skip(self))]
    pub async fn wait(self) -> Result<(), DownloadError> {
        let Self {
            sender,
            receiver,
            mut workers,
            shared,
            submitted,
        } = self;
        drop(sender);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                let message = if e.is_panic() {
                    panic_message(&*e.into_panic())
                } else {
                    e.to_string()
                };
                warn!(%message, "worker task ended abnormally");
                shared
                    .failure
                    .record(DownloadError::WorkerPanicked { message });
                shared.cancel.cancel();
            }
        }

        // Jobs still queued once the workers are gone never ran.
        let mut rx = receiver.lock().await;
        while rx.try_recv().is_ok() {
            shared.stats.skipped.fetch_add(1, Ordering::SeqCst);
        }
        drop(rx);

        let stats = &shared.stats;
        let submitted = submitted.load(Ordering::SeqCst);
        info!(
            submitted,
            attempts = stats.attempts(),
            retried = stats.retried(),
            succeeded = stats.succeeded(),
            failed = stats.failed(),
            skipped = stats.skipped(),
            "worker pool finished"
        );

        if let Some(error) = shared.failure.take() {
            return Err(error);
        }
        if stats.succeeded() != submitted {
            return Err(DownloadError::Cancelled);
        }
        Ok(())
    }
}

async fn worker_loop(
    worker: usize,
    receiver: Arc<AsyncMutex<mpsc::Receiver<Job>>>,
    shared: Arc<Shared>,
) {
    loop {
        let job = {
            let mut rx = receiver.lock().await;
            tokio::select! {
                biased;
                () = shared.cancel.cancelled() => None,
                job = rx.recv() => job,
            }
        };
        let Some(job) = job else {
            break;
        };

        let index = job.index;
        let outcome = match AssertUnwindSafe(run_job(&shared, worker, job))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(payload) => TaskOutcome::Failed(DownloadError::WorkerPanicked {
                message: panic_message(&*payload),
            }),
        };

        shared.stats.record(&outcome);
        match outcome {
            TaskOutcome::Succeeded => {}
            TaskOutcome::Failed(error) => {
                warn!(worker, chunk = index, error = %error, "chunk failed, cancelling pool");
                shared.failure.record(error);
                shared.cancel.cancel();
            }
            TaskOutcome::Aborted => {
                shared.failure.record(DownloadError::Cancelled);
            }
        }
    }
    debug!(worker, "worker exiting");
}

/// Runs attempts for one job until success, exhaustion, or cancellation.
async fn run_job(shared: &Shared, worker: usize, mut job: Job) -> TaskOutcome {
    let mut attempt = 0u32;
    loop {
        if shared.cancel.is_cancelled() {
            debug!(worker, chunk = job.index, attempt, "pool cancelled, not starting attempt");
            return TaskOutcome::Aborted;
        }

        attempt += 1;
        shared.stats.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt > 1 {
            shared.stats.retried.fetch_add(1, Ordering::SeqCst);
        }

        let error = match (job.task)().await {
            Ok(()) => {
                debug!(worker, chunk = job.index, attempt, "chunk done");
                return TaskOutcome::Succeeded;
            }
            Err(error) => error,
        };

        match shared.policy.should_retry(attempt) {
            RetryDecision::Retry { delay, attempt: next } => {
                warn!(
                    worker,
                    chunk = job.index,
                    attempt,
                    next_attempt = next,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "chunk attempt failed, retrying"
                );
                if !delay.is_zero() {
                    tokio::select! {
                        biased;
                        () = shared.cancel.cancelled() => return TaskOutcome::Aborted,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
            RetryDecision::DoNotRetry { reason } => {
                debug!(worker, chunk = job.index, %reason, "giving up on chunk");
                return TaskOutcome::Failed(DownloadError::retries_exhausted(
                    job.index, attempt, error,
                ));
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
