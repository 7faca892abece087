//! Bounded FIFO of job ids waiting for a worker.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::job::JobId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue already holds `capacity` ids.
    Full(JobId),
    /// The queue was closed by [`AdmissionQueue::close`].
    Closed(JobId),
}

#[derive(Debug, PartialEq, Eq)]
pub enum Dequeued {
    Job(JobId),
    /// Nothing arrived before the timeout.
    Idle,
    /// Closed and drained.
    Closed,
}

/// Multi-producer, multi-consumer admission queue.
///
/// Each id is delivered to exactly one consumer. Enqueue never blocks: a
/// full queue is reported back to the caller as [`EnqueueError::Full`].
/// Clones share one sender; [`close`](Self::close) drops it, after which
/// consumers drain what is left and then see [`Dequeued::Closed`].
#[derive(Clone)]
pub struct AdmissionQueue {
    sender: Arc<RwLock<Option<Sender<JobId>>>>,
    receiver: Receiver<JobId>,
    capacity: usize,
}

impl AdmissionQueue {
    pub fn bounded(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender: Arc::new(RwLock::new(Some(sender))),
            receiver,
            capacity,
        }
    }

    pub fn enqueue(&self, id: JobId) -> Result<(), EnqueueError> {
        let sender = match self.sender.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let Some(sender) = sender.as_ref() else {
            return Err(EnqueueError::Closed(id));
        };
        sender.try_send(id).map_err(|e| match e {
            TrySendError::Full(id) => EnqueueError::Full(id),
            TrySendError::Disconnected(id) => EnqueueError::Closed(id),
        })
    }

    /// Stops admitting ids. Returns `false` if the queue was already closed.
    pub fn close(&self) -> bool {
        let mut sender = match self.sender.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        sender.take().is_some()
    }

    pub fn is_closed(&self) -> bool {
        match self.sender.read() {
            Ok(g) => g.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    pub fn dequeue_timeout(&self, timeout: Duration) -> Dequeued {
        match self.receiver.recv_timeout(timeout) {
            Ok(id) => Dequeued::Job(id),
            Err(RecvTimeoutError::Timeout) => Dequeued::Idle,
            Err(RecvTimeoutError::Disconnected) => Dequeued::Closed,
        }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
