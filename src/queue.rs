//! Bounded FIFO work queues connecting the render loop and worker threads.
//!
//! These are the only cross-thread primitive in the pipeline: every stage
//! consumes exactly one input queue and produces to exactly one result
//! queue, and the render loop only ever polls without blocking.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::time::Duration;
use tracing::debug;

/// A bounded FIFO queue with non-blocking submit and drain semantics.
///
/// Cloning shares the underlying channel; any clone may submit or pop.
/// An item is never duplicated or lost except by an explicit, logged
/// drop-on-full at submission time.
#[derive(Debug, Clone)]
pub struct WorkQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    name: &'static str,
}

impl<T> WorkQueue<T> {
    /// Create a queue holding at most `capacity` items.
    #[must_use]
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx, name }
    }

    /// Non-blocking enqueue.
    ///
    /// Returns `false` and drops the item if the queue is at capacity.
    /// A full queue is backpressure, not an error.
    pub fn submit(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("queue '{}' full, dropping item", self.name);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("queue '{}' disconnected, dropping item", self.name);
                false
            }
        }
    }

    /// Pop at most `n` items without blocking.
    ///
    /// Used by the per-frame tick to bound work done per frame.
    #[must_use]
    pub fn drain_up_to(&self, n: usize) -> Vec<T> {
        let mut items = Vec::new();
        while items.len() < n {
            match self.rx.try_recv() {
                Ok(item) => items.push(item),
                Err(_) => break,
            }
        }
        items
    }

    /// Pop a single item without blocking.
    #[must_use]
    pub fn poll(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Blocking pop with a timeout, used by dedicated worker threads.
    ///
    /// Returns `None` on timeout so the worker can re-check its stop
    /// condition promptly even when the queue is idle.
    #[must_use]
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Number of items currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn submit_respects_capacity() {
        let queue = WorkQueue::new("test", 3);
        assert!(queue.submit(1));
        assert!(queue.submit(2));
        assert!(queue.submit(3));
        // capacity + 1: rejected, exactly `capacity` items retained
        assert!(!queue.submit(4));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn drain_preserves_fifo_order_and_bound() {
        let queue = WorkQueue::new("test", 10);
        for i in 0..5 {
            assert!(queue.submit(i));
        }
        let first = queue.drain_up_to(3);
        assert_eq!(first, vec![0, 1, 2]);
        let rest = queue.drain_up_to(10);
        assert_eq!(rest, vec![3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_empty_returns_nothing() {
        let queue: WorkQueue<u32> = WorkQueue::new("test", 4);
        assert!(queue.drain_up_to(3).is_empty());
        assert!(queue.poll().is_none());
    }

    #[test]
    fn pop_timeout_returns_none_when_idle() {
        let queue: WorkQueue<u32> = WorkQueue::new("test", 4);
        let start = std::time::Instant::now();
        assert!(queue.pop_timeout(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn pop_timeout_observes_cross_thread_submit() {
        let queue = WorkQueue::new("test", 4);
        let producer = queue.clone();
        let handle = std::thread::spawn(move || {
            producer.submit(42);
        });
        let item = queue.pop_timeout(Duration::from_secs(1));
        assert_eq!(item, Some(42));
        handle.join().unwrap();
    }
}
