//! Elastic Worker Pool
//!
//! Jobs are handed to workers one at a time: `enqueue` returns only once a worker has
//! taken the job. Every worker re-evaluates the pool before each dequeue:
//!
//! - **Scale-up**: pool below `max_workers` and queue depth at or above
//!   `queue_max_length` → request one more worker.
//! - **Scale-down**: pool above one and queue depth at or below `queue_max_length`
//!   → the evaluating worker retires itself.
//!
//! Pool size changes go through compare-and-swap on one counter, so the pool stays
//! within `1..=max_workers` even when workers evaluate concurrently. Queue depth is
//! read without synchronization; the policy only reacts to it.

use super::dispatch::JobHandler;
use super::types::{Job, WorkerId};
use crate::error::{NodeError, Result};

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

/// A job waiting for a worker, with the channel that tells its caller it was taken.
struct Handoff {
    job: Job,
    accepted: oneshot::Sender<()>,
}

/// Counts a caller as queued for as long as it is waiting in `enqueue`.
struct QueuedGuard<'a>(&'a AtomicUsize);

impl<'a> QueuedGuard<'a> {
    fn new(depth: &'a AtomicUsize) -> Self {
        depth.fetch_add(1, Ordering::SeqCst);
        Self(depth)
    }
}

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Scheduler {
    max_workers: usize,
    queue_max_length: usize,
    handler: Arc<dyn JobHandler>,
    sender: mpsc::UnboundedSender<Handoff>,
    receiver: Mutex<mpsc::UnboundedReceiver<Handoff>>,
    /// Workers alive or starting, minus those that already decided to retire.
    pool_size: AtomicUsize,
    /// Callers blocked in `enqueue`.
    queue_depth: AtomicUsize,
    /// Termination channel of every running worker.
    workers: DashMap<WorkerId, mpsc::Sender<()>>,
    closed: AtomicBool,
}

impl Scheduler {
    /// Creates an empty pool. Call `spawn_worker` to start the first worker.
    pub fn new(
        max_workers: usize,
        queue_max_length: usize,
        handler: Arc<dyn JobHandler>,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            max_workers: max_workers.max(1),
            queue_max_length,
            handler,
            sender,
            receiver: Mutex::new(receiver),
            pool_size: AtomicUsize::new(0),
            queue_depth: AtomicUsize::new(0),
            workers: DashMap::new(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size.load(Ordering::SeqCst)
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::SeqCst)
    }

    /// Hands `job` to the pool and waits until a worker takes it.
    ///
    /// There is no timeout. A caller that gives up (drops this future) before a
    /// worker takes the job cancels it; the job is then never executed.
    pub async fn enqueue(&self, job: Job) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(NodeError::SchedulerClosed);
        }

        let kind = job.kind();
        let (accepted_tx, accepted_rx) = oneshot::channel();
        let _queued = QueuedGuard::new(&self.queue_depth);

        self.sender
            .send(Handoff {
                job,
                accepted: accepted_tx,
            })
            .map_err(|_| NodeError::SchedulerClosed)?;

        tracing::trace!("Waiting for a worker to accept {} job", kind);
        accepted_rx.await.map_err(|_| NodeError::SchedulerClosed)
    }

    /// Enqueues from a background task so the caller does not wait for a worker.
    pub fn enqueue_detached(self: &Arc<Self>, job: Job) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            let kind = job.kind();
            if let Err(e) = scheduler.enqueue(job).await {
                tracing::error!("Failed to enqueue {} job: {}", kind, e);
            }
        });
    }

    /// Starts one more worker unless the pool is already at `max_workers`.
    ///
    /// Returns whether a worker was started.
    pub fn spawn_worker(self: &Arc<Self>) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }

        let reserved = self
            .pool_size
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_workers).then_some(n + 1)
            });

        let previous = match reserved {
            Ok(previous) => previous,
            Err(_) => {
                tracing::warn!(
                    "Max workers ({}) does not allow for a new worker to be spawned",
                    self.max_workers
                );
                return false;
            }
        };

        let worker_id = WorkerId::new();
        let (die_tx, die_rx) = mpsc::channel(1);
        self.workers.insert(worker_id.clone(), die_tx.clone());

        tracing::info!(
            "Spawning worker {}, new worker count: {}",
            worker_id,
            previous + 1
        );

        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.worker_loop(worker_id, die_tx, die_rx).await;
        });

        true
    }

    /// Signals every worker to stop. Running jobs finish; queued jobs are dropped.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::info!("Stopping {} workers", self.workers.len());
        for entry in self.workers.iter() {
            let _ = entry.value().try_send(());
        }
        self.pool_size.store(0, Ordering::SeqCst);
    }

    /// Reserves the retirement of one worker, never going below one.
    fn try_retire(&self) -> bool {
        self.pool_size
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n > 1).then(|| n - 1)
            })
            .is_ok()
    }

    /// Applies the scale policy from the point of view of one worker.
    fn evaluate_pool(self: &Arc<Self>, worker_id: &WorkerId, die_tx: &mpsc::Sender<()>) {
        let workers = self.pool_size();
        let depth = self.queue_depth();

        if workers < self.max_workers && depth >= self.queue_max_length {
            tracing::info!(
                "Queue depth {} reached threshold {}",
                depth,
                self.queue_max_length
            );
            self.spawn_worker();
        } else if workers > 1 && depth <= self.queue_max_length && self.try_retire() {
            tracing::info!(
                "Too many workers for queue depth {}. Retiring worker {}...",
                depth,
                worker_id
            );
            let _ = die_tx.try_send(());
        }
    }

    /// Drops every job still waiting so their callers stop waiting.
    async fn drain_queue(&self) {
        let mut receiver = self.receiver.lock().await;
        receiver.close();
        let mut dropped = 0;
        while receiver.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            tracing::warn!("Dropped {} queued jobs on shutdown", dropped);
        }
    }

    async fn next_handoff(&self) -> Option<Handoff> {
        self.receiver.lock().await.recv().await
    }

    async fn worker_loop(
        self: Arc<Self>,
        worker_id: WorkerId,
        die_tx: mpsc::Sender<()>,
        mut die_rx: mpsc::Receiver<()>,
    ) {
        tracing::debug!("Worker {} started", worker_id);

        loop {
            self.evaluate_pool(&worker_id, &die_tx);

            tokio::select! {
                biased;

                _ = die_rx.recv() => {
                    self.workers.remove(&worker_id);
                    if self.closed.load(Ordering::SeqCst) {
                        self.drain_queue().await;
                    }
                    tracing::info!("Worker {} stopped", worker_id);
                    return;
                }

                handoff = self.next_handoff() => {
                    let Some(handoff) = handoff else {
                        self.workers.remove(&worker_id);
                        return;
                    };

                    if handoff.accepted.send(()).is_err() {
                        tracing::debug!(
                            "Caller abandoned {} job before worker {} took it",
                            handoff.job.kind(),
                            worker_id
                        );
                        continue;
                    }

                    self.execute(&worker_id, handoff.job).await;
                }
            }
        }
    }

    /// Runs the job in its own task so a panic ends only that job.
    async fn execute(&self, worker_id: &WorkerId, job: Job) {
        let kind = job.kind();
        tracing::debug!("Worker {} executing {} job", worker_id, kind);

        let handler = self.handler.clone();
        match tokio::spawn(async move { handler.handle(job).await }).await {
            Ok(Ok(())) => {
                tracing::debug!("Worker {} finished {} job", worker_id, kind);
            }
            Ok(Err(e)) => {
                tracing::error!("{} job failed: {:#}", kind, e);
            }
            Err(e) if e.is_panic() => {
                tracing::error!("{} job panicked on worker {}", kind, worker_id);
            }
            Err(e) => {
                tracing::error!("{} job was cancelled: {}", kind, e);
            }
        }
    }
}
