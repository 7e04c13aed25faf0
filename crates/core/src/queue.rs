use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crossbeam_queue::SegQueue;
use parking_lot::{Condvar, Mutex};

use crate::metrics::{Counter, Metrics};

/// Result of attempting to enqueue.
///
/// # Example
/// ```rust
/// use essence_core::prelude::{JobQueue, SendOutcome};
///
/// let queue = JobQueue::<u8>::new();
/// assert_eq!(queue.enqueue(1), SendOutcome::Ok);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Value was accepted.
    Ok,
    /// Queue is closed.
    Closed,
}

/// Result of attempting to dequeue.
///
/// # Example
/// ```rust
/// use essence_core::prelude::{JobQueue, RecvOutcome};
///
/// let queue = JobQueue::<u8>::new();
/// assert!(matches!(queue.try_dequeue(), RecvOutcome::Empty));
/// ```
#[derive(Debug)]
pub enum RecvOutcome<T> {
    /// Received value.
    Data(T),
    /// Queue has been closed and drained.
    Closed,
    /// Queue currently empty.
    Empty,
}

/// Unbounded multi-producer FIFO with a blocking consumer side.
///
/// `enqueue` never blocks and wakes one waiting consumer. `dequeue` blocks
/// until an item is available and hands items out in insertion order.
///
/// # Example
/// ```rust
/// use essence_core::prelude::{JobQueue, RecvOutcome};
///
/// let queue = JobQueue::new();
/// let producer = queue.clone();
/// let handle = std::thread::spawn(move || {
///     for i in 0..3 {
///         producer.enqueue(i);
///     }
/// });
/// let got: Vec<_> = (0..3)
///     .map(|_| match queue.dequeue() {
///         RecvOutcome::Data(v) => v,
///         _ => unreachable!(),
///     })
///     .collect();
/// handle.join().unwrap();
/// assert_eq!(got, vec![0, 1, 2]);
/// ```
pub struct JobQueue<T> {
    inner: Arc<QueueInner<T>>,
}

impl<T> Clone for JobQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct QueueInner<T> {
    queue: SegQueue<T>,
    closed: AtomicBool,
    lock: Mutex<()>,
    ready: Condvar,
    metrics: Metrics,
}

impl<T> Default for JobQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JobQueue<T> {
    /// Create an empty, open queue.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(QueueInner {
                queue: SegQueue::new(),
                closed: AtomicBool::new(false),
                lock: Mutex::new(()),
                ready: Condvar::new(),
                metrics: Metrics::default(),
            }),
        }
    }

    /// Append a value and wake one waiter.
    pub fn enqueue(&self, value: T) -> SendOutcome {
        if self.inner.closed.load(Ordering::Acquire) {
            return SendOutcome::Closed;
        }
        self.inner.queue.push(value);
        self.inner.metrics.bump(Counter::Enqueued);
        // Taking the lock orders this push against a consumer about to wait.
        drop(self.inner.lock.lock());
        self.inner.ready.notify_one();
        SendOutcome::Ok
    }

    /// Pop the oldest value without blocking.
    pub fn try_dequeue(&self) -> RecvOutcome<T> {
        match self.inner.queue.pop() {
            Some(value) => {
                self.inner.metrics.bump(Counter::Dequeued);
                RecvOutcome::Data(value)
            }
            None if self.inner.closed.load(Ordering::Acquire) => RecvOutcome::Closed,
            None => RecvOutcome::Empty,
        }
    }

    /// Block until a value is available or the queue is closed and empty.
    pub fn dequeue(&self) -> RecvOutcome<T> {
        loop {
            match self.try_dequeue() {
                RecvOutcome::Empty => {}
                other => return other,
            }
            let mut guard = self.inner.lock.lock();
            match self.try_dequeue() {
                RecvOutcome::Empty => self.inner.ready.wait(&mut guard),
                other => return other,
            }
        }
    }

    /// Like [`dequeue`](Self::dequeue) but gives up after `timeout`, returning `Empty`.
    pub fn dequeue_timeout(&self, timeout: Duration) -> RecvOutcome<T> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.try_dequeue() {
                RecvOutcome::Empty => {}
                other => return other,
            }
            let mut guard = self.inner.lock.lock();
            match self.try_dequeue() {
                RecvOutcome::Empty => {
                    if self.inner.ready.wait_until(&mut guard, deadline).timed_out() {
                        return self.try_dequeue();
                    }
                }
                other => return other,
            }
        }
    }

    /// Approximate number of queued values, for reporting only.
    pub fn size(&self) -> usize {
        self.inner.queue.len()
    }

    /// Whether the queue currently holds no values.
    pub fn is_empty(&self) -> bool {
        self.inner.queue.is_empty()
    }

    /// Refuse further values and wake every waiter.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        drop(self.inner.lock.lock());
        self.inner.ready.notify_all();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Traffic counters for this queue.
    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fifo_across_threads() {
        let queue = JobQueue::new();
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let RecvOutcome::Data(v) = queue.dequeue() {
                    seen.push(v);
                }
                seen
            })
        };
        for i in 0..500u32 {
            assert_eq!(queue.enqueue(i), SendOutcome::Ok);
        }
        queue.close();
        let seen = consumer.join().unwrap();
        assert_eq!(seen, (0..500).collect::<Vec<_>>());
        assert_eq!(queue.metrics().get(Counter::Dequeued), 500);
    }

    #[test]
    fn closed_queue_rejects_and_drains() {
        let queue = JobQueue::new();
        queue.enqueue(7u8);
        queue.close();
        assert_eq!(queue.enqueue(8), SendOutcome::Closed);
        assert!(matches!(queue.dequeue(), RecvOutcome::Data(7)));
        assert!(matches!(queue.dequeue(), RecvOutcome::Closed));
    }

    #[test]
    fn dequeue_timeout_expires() {
        let queue = JobQueue::<u8>::new();
        let start = Instant::now();
        assert!(matches!(
            queue.dequeue_timeout(Duration::from_millis(20)),
            RecvOutcome::Empty
        ));
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(queue.size(), 0);
    }
}
