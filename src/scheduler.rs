//! Bounded concurrency scheduler
//!
//! Admits at most `limit` units of work at a time from a FIFO backlog. A
//! single dispatcher task takes units off the backlog in submission order,
//! waits for a free slot, and only then spawns the unit as its own tokio
//! task, so a panic in one unit is reported as [`SchedulerError::TaskFailed`]
//! for that unit only.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Task failed: {0}")]
    TaskFailed(String),
}

/// Snapshot of the scheduler's queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// Units submitted but not yet admitted
    pub backlog: usize,
    /// Units currently running
    pub in_flight: usize,
}

#[derive(Debug, Default)]
struct Counters {
    backlog: AtomicUsize,
    in_flight: AtomicUsize,
}

/// Read-only view of the scheduler's counters, usable from another task
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    counters: Arc<Counters>,
}

impl ProgressHandle {
    pub fn progress(&self) -> Progress {
        Progress {
            backlog: self.counters.backlog.load(Ordering::SeqCst),
            in_flight: self.counters.in_flight.load(Ordering::SeqCst),
        }
    }
}

/// Decrements the in-flight count when a unit ends, including by panic
struct InFlightGuard(Arc<Counters>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

type Unit<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A backlog entry: the unit and where to hand back its task handle
struct Queued<T> {
    unit: Unit<T>,
    spawned: oneshot::Sender<JoinHandle<T>>,
}

pub struct Scheduler<T> {
    backlog: mpsc::UnboundedSender<Queued<T>>,
    counters: Arc<Counters>,
    pending: Vec<oneshot::Receiver<JoinHandle<T>>>,
}

impl<T: Send + 'static> Scheduler<T> {
    /// Starts the dispatcher. Must be called inside a tokio runtime.
    pub fn new(limit: usize) -> Self {
        let (backlog, queue) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());
        tokio::spawn(dispatch(
            queue,
            Arc::new(Semaphore::new(limit.max(1))),
            Arc::clone(&counters),
        ));

        Self {
            backlog,
            counters,
            pending: Vec::new(),
        }
    }

    /// Queues a unit of work. It starts once a slot frees up, in submission order.
    pub fn submit<F>(&mut self, unit: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let (spawned, handle) = oneshot::channel();
        self.counters.backlog.fetch_add(1, Ordering::SeqCst);
        if self
            .backlog
            .send(Queued {
                unit: Box::pin(unit),
                spawned,
            })
            .is_err()
        {
            // Dispatcher is gone; the dropped sender surfaces as TaskFailed in join
            self.counters.backlog.fetch_sub(1, Ordering::SeqCst);
        }
        self.pending.push(handle);
    }

    pub fn progress(&self) -> Progress {
        self.progress_handle().progress()
    }

    pub fn progress_handle(&self) -> ProgressHandle {
        ProgressHandle {
            counters: Arc::clone(&self.counters),
        }
    }

    /// Waits for every submitted unit to settle.
    ///
    /// Results are returned in submission order; a unit that panicked or was
    /// cancelled yields `Err` without affecting the others.
    pub async fn join(self) -> Vec<Result<T, SchedulerError>> {
        let Self {
            backlog, pending, ..
        } = self;
        // Lets the dispatcher exit once the backlog is drained
        drop(backlog);

        let mut results = Vec::with_capacity(pending.len());
        for handle in pending {
            let result = match handle.await {
                Ok(handle) => handle.await.map_err(|e| {
                    error!("Scheduled task failed: {}", e);
                    SchedulerError::TaskFailed(e.to_string())
                }),
                Err(_) => {
                    error!("Scheduled task was never started");
                    Err(SchedulerError::TaskFailed("never started".to_string()))
                }
            };
            results.push(result);
        }
        results
    }
}

/// Admits queued units one by one: a permit is taken before the unit is spawned
async fn dispatch<T: Send + 'static>(
    mut queue: mpsc::UnboundedReceiver<Queued<T>>,
    permits: Arc<Semaphore>,
    counters: Arc<Counters>,
) {
    while let Some(Queued { unit, spawned }) = queue.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            return;
        };
        counters.backlog.fetch_sub(1, Ordering::SeqCst);
        counters.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard(Arc::clone(&counters));

        let handle = tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;
            unit.await
        });
        let _ = spawned.send(handle);
    }
}
