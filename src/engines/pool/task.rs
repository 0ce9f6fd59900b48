use crate::error::{FilterOptError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

/// One-shot handle to a submitted task's result.
///
/// The result is delivered exactly once. After `wait_deadline` or
/// `try_result` has yielded `Some`, both return `None`. A task whose worker
/// discarded it (pool abandoned) resolves to `PoolClosed`.
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: u64,
    receiver: Receiver<Result<T>>,
    resolved: bool,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(id: u64, receiver: Receiver<Result<T>>) -> Self {
        Self {
            id,
            receiver,
            resolved: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Block until the task finishes.
    pub fn wait(self) -> Result<T> {
        if self.resolved {
            return Err(FilterOptError::PoolClosed);
        }
        self.receiver.recv().unwrap_or(Err(FilterOptError::PoolClosed))
    }

    /// Block for at most `timeout`; an unfinished task is an `EvaluationTimeout`.
    pub fn wait_timeout(mut self, timeout: Duration) -> Result<T> {
        match self.wait_deadline(Instant::now() + timeout) {
            Some(result) => result,
            None => Err(FilterOptError::EvaluationTimeout(timeout)),
        }
    }

    /// `None` if the task is still running at `deadline`.
    pub fn wait_deadline(&mut self, deadline: Instant) -> Option<Result<T>> {
        if self.resolved {
            return None;
        }
        let outcome = match self.receiver.recv_deadline(deadline) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => Err(FilterOptError::PoolClosed),
        };
        self.resolved = true;
        Some(outcome)
    }

    /// Non-blocking poll.
    pub fn try_result(&mut self) -> Option<Result<T>> {
        if self.resolved {
            return None;
        }
        let outcome = match self.receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(FilterOptError::PoolClosed),
        };
        self.resolved = true;
        Some(outcome)
    }
}
