use super::task::TaskHandle;
use crate::config::{Backpressure, PoolConfig};
use crate::error::{FilterOptError, Result};
use crossbeam_channel::{bounded, SendTimeoutError, Sender, TrySendError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    rejected: AtomicU64,
    deferred: AtomicU64,
    panicked: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub submitted: u64,
    pub completed: u64,
    /// Submissions refused outright: a full `FailFast` queue or a closed pool.
    pub rejected: u64,
    /// `submit_until` calls that reached their deadline on a full queue.
    /// The caller still holds the task and may retry it.
    pub deferred: u64,
    pub panicked: u64,
}

/// Fixed set of worker threads draining a bounded job queue.
///
/// Each submitted closure runs at most once, on one worker, and its handle
/// resolves exactly once. A full queue blocks the submitter or fails with
/// `QueueFull`, depending on the configured backpressure. Once the pool is
/// shut down or abandoned, submissions fail with `PoolClosed`.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
    abandoned: Arc<AtomicBool>,
    capacity: usize,
    backpressure: Backpressure,
    next_id: AtomicU64,
}

impl WorkerPool {
    pub fn new(config: &PoolConfig) -> Result<Self> {
        Self::with_workers(config.effective_workers(), config.queue_capacity, config.backpressure)
    }

    pub fn with_workers(worker_count: usize, capacity: usize, backpressure: Backpressure) -> Result<Self> {
        if worker_count == 0 || capacity == 0 {
            return Err(FilterOptError::Configuration(
                "worker pool needs at least one worker and one queue slot".to_string(),
            ));
        }

        let (sender, receiver) = bounded::<Job>(capacity);
        let abandoned = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let receiver = receiver.clone();
            let abandoned = Arc::clone(&abandoned);
            let handle = thread::Builder::new()
                .name(format!("filteropt-worker-{}", i))
                .spawn(move || {
                    // Ends once every sender is gone and the queue is empty.
                    for job in receiver.iter() {
                        if abandoned.load(Ordering::Acquire) {
                            continue;
                        }
                        job();
                    }
                })?;
            workers.push(handle);
        }

        log::debug!(
            "Worker pool started: {} workers, queue capacity {}, {:?} backpressure",
            worker_count,
            capacity,
            backpressure
        );

        Ok(Self {
            sender: Some(sender),
            workers,
            counters: Arc::new(Counters::default()),
            abandoned,
            capacity,
            backpressure,
            next_id: AtomicU64::new(0),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn queued(&self) -> usize {
        self.sender.as_ref().map_or(0, |s| s.len())
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_none()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            deferred: self.counters.deferred.load(Ordering::Relaxed),
            panicked: self.counters.panicked.load(Ordering::Relaxed),
        }
    }

    /// Enqueue `task`, blocking while the queue is full under `Block`
    /// backpressure.
    pub fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.enqueue(task, None)
    }

    /// Like `submit`, but a `Block` submitter gives up at `deadline` with
    /// `QueueFull` instead of waiting indefinitely.
    pub fn submit_until<F, T>(&self, task: F, deadline: Instant) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.enqueue(task, Some(deadline))
    }

    fn enqueue<F, T>(&self, task: F, deadline: Option<Instant>) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let Some(sender) = self.sender.as_ref() else {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(FilterOptError::PoolClosed);
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (result_tx, result_rx) = bounded::<Result<T>>(1);
        let counters = Arc::clone(&self.counters);
        let job: Job = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(task)).unwrap_or_else(|payload| {
                counters.panicked.fetch_add(1, Ordering::Relaxed);
                Err(FilterOptError::EvaluationPanic(panic_message(payload.as_ref())))
            });
            counters.completed.fetch_add(1, Ordering::Relaxed);
            // The handle may already be dropped; nobody is waiting then.
            let _ = result_tx.send(outcome);
        });

        let sent = match (self.backpressure, deadline) {
            (Backpressure::FailFast, _) => sender.try_send(job).map_err(|e| match e {
                TrySendError::Full(_) => FilterOptError::QueueFull(self.capacity),
                TrySendError::Disconnected(_) => FilterOptError::PoolClosed,
            }),
            (Backpressure::Block, Some(deadline)) => {
                sender.send_deadline(job, deadline).map_err(|e| match e {
                    SendTimeoutError::Timeout(_) => FilterOptError::QueueFull(self.capacity),
                    SendTimeoutError::Disconnected(_) => FilterOptError::PoolClosed,
                })
            }
            (Backpressure::Block, None) => sender.send(job).map_err(|_| FilterOptError::PoolClosed),
        };

        match sent {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(TaskHandle::new(id, result_rx))
            }
            Err(e) => {
                let counter = match (&e, self.backpressure) {
                    (FilterOptError::QueueFull(_), Backpressure::Block) => &self.counters.deferred,
                    _ => &self.counters.rejected,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Stop accepting work, let queued and running tasks finish, and join
    /// every worker.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() && self.workers.is_empty() {
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::warn!("Worker thread exited abnormally");
            }
        }
        log::debug!("Worker pool shut down: {:?}", self.stats());
    }

    /// Stop accepting work and discard queued tasks without waiting. Tasks
    /// already running finish on their detached threads; discarded tasks
    /// resolve to `PoolClosed`.
    pub fn abandon(&mut self) {
        self.abandoned.store(true, Ordering::Release);
        self.sender = None;
        let detached = self.workers.drain(..).count();
        log::debug!("Worker pool abandoned; {} workers detached", detached);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
