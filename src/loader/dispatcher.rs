//! Job dispatcher: bounded workers draining a LIFO queue.
//!
//! The queue is unbounded and last-in-first-out, so the most recently
//! requested resources are serviced first (those are the tiles currently on
//! screen). The worker count is bounded; workers are spawned on demand and
//! retire after an idle keep-alive window.
//!
//! Cancellation only touches jobs still sitting in the queue. A job a worker
//! has picked up always runs to completion: the I/O is already being spent,
//! so its result is cached and delivered even if nobody is waiting anymore.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

/// A unit of work the dispatcher can run or cancel.
#[async_trait]
pub trait Dispatchable: Send {
    /// Execute the job to completion. The job reports its own outcome.
    async fn run(self: Box<Self>);

    /// Called instead of [`run`](Dispatchable::run) when the job is removed
    /// from the queue before starting; must synchronously report CANCELED.
    fn cancel(self: Box<Self>);
}

struct DispatcherInner {
    queue: Mutex<Vec<Box<dyn Dispatchable>>>,
    notify: Notify,
    workers: AtomicUsize,
    max_workers: usize,
    keep_alive: Duration,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Bounded worker pool over an unbounded LIFO queue.
#[derive(Clone)]
pub struct JobDispatcher {
    inner: Arc<DispatcherInner>,
}

impl JobDispatcher {
    pub fn new(max_workers: usize, keep_alive: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            inner: Arc::new(DispatcherInner {
                queue: Mutex::new(Vec::new()),
                notify: Notify::new(),
                workers: AtomicUsize::new(0),
                max_workers: max_workers.max(1),
                keep_alive,
                shutdown_tx,
                shutdown_rx,
            }),
        }
    }

    /// Queue a job. Never blocks; wakes an idle worker or spawns a new one
    /// if the pool is not at its limit.
    pub fn execute(&self, job: Box<dyn Dispatchable>) {
        if *self.inner.shutdown_rx.borrow() {
            tracing::debug!("dispatcher shut down, canceling job instead of queueing");
            job.cancel();
            return;
        }
        self.inner.queue.lock().push(job);
        spawn_worker_if_needed(&self.inner);
        self.inner.notify.notify_one();
    }

    /// Remove every job still sitting in the queue and run its cancellation
    /// hook. Jobs already picked up by workers are unaffected.
    pub fn cancel_queued(&self) {
        let drained: Vec<_> = std::mem::take(&mut *self.inner.queue.lock());
        let count = drained.len();
        for job in drained {
            job.cancel();
        }
        if count > 0 {
            tracing::debug!(count = count, "canceled queued jobs");
        }
    }

    /// Signal shutdown: cancels queued jobs and interrupts retry backoffs in
    /// running jobs. Running jobs still finish their current attempt.
    pub fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(true);
        self.cancel_queued();
        self.inner.notify.notify_waiters();
    }

    /// A receiver jobs can select on to abort backoff sleeps early.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown_rx.clone()
    }

    /// Jobs waiting in the queue.
    pub fn queued_count(&self) -> usize {
        self.inner.queue.lock().len()
    }

    #[cfg(test)]
    fn worker_count(&self) -> usize {
        self.inner.workers.load(Ordering::SeqCst)
    }
}

fn spawn_worker_if_needed(inner: &Arc<DispatcherInner>) {
    let mut current = inner.workers.load(Ordering::SeqCst);
    loop {
        if current >= inner.max_workers {
            return;
        }
        match inner.workers.compare_exchange(
            current,
            current + 1,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => break,
            Err(observed) => current = observed,
        }
    }
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        worker_loop(&inner).await;
        inner.workers.fetch_sub(1, Ordering::SeqCst);
        // A job may have been queued while this worker was deciding to
        // retire; make sure someone picks it up.
        if !inner.queue.lock().is_empty() {
            spawn_worker_if_needed(&inner);
        }
    });
}

async fn worker_loop(inner: &Arc<DispatcherInner>) {
    let mut shutdown = inner.shutdown_rx.clone();
    loop {
        // LIFO: pop the most recently queued job.
        let job = inner.queue.lock().pop();
        match job {
            Some(job) => job.run().await,
            None => {
                if *shutdown.borrow() {
                    return;
                }
                tokio::select! {
                    _ = inner.notify.notified() => {}
                    _ = tokio::time::sleep(inner.keep_alive) => return,
                    _ = shutdown.changed() => return,
                }
            }
        }
    }
}
