//! Bounded drop-oldest queue.
//!
//! `tokio::sync::mpsc` blocks the sender when full; §4.A/§4.B require the
//! opposite policy — when a per-topic buffer is full, the *oldest* queued
//! item is discarded to make room for the newest, and a drop counter is
//! incremented. This is that queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
}

/// Handle to push items into the queue. Cheaply cloneable.
#[derive(Clone)]
pub struct DropOldestSender<T> {
    inner: Arc<Inner<T>>,
}

/// Handle to pull items out of the queue, one consumer at a time.
pub struct DropOldestReceiver<T> {
    inner: Arc<Inner<T>>,
}

/// Creates a bounded drop-oldest queue with the given capacity.
pub fn channel<T>(capacity: usize) -> (DropOldestSender<T>, DropOldestReceiver<T>) {
    let inner = Arc::new(Inner {
        items: Mutex::new(VecDeque::with_capacity(capacity)),
        notify: Notify::new(),
        capacity: capacity.max(1),
        dropped: AtomicU64::new(0),
    });
    (
        DropOldestSender {
            inner: inner.clone(),
        },
        DropOldestReceiver { inner },
    )
}

impl<T> DropOldestSender<T> {
    /// Pushes an item, dropping the oldest queued item if the buffer is
    /// already at capacity (never blocks).
    pub async fn push(&self, item: T) {
        let mut items = self.inner.items.lock().await;
        if items.len() >= self.inner.capacity {
            items.pop_front();
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
        }
        items.push_back(item);
        drop(items);
        self.inner.notify.notify_one();
    }

    /// Number of items dropped so far due to backpressure.
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl<T> DropOldestReceiver<T> {
    /// Waits for and returns the next item, in FIFO order among whatever
    /// survived drop-oldest backpressure.
    pub async fn recv(&mut self) -> T {
        loop {
            {
                let mut items = self.inner.items.lock().await;
                if let Some(item) = items.pop_front() {
                    return item;
                }
            }
            self.inner.notify.notified().await;
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drops_oldest_when_full() {
        let (tx, mut rx) = channel::<i32>(2);
        tx.push(1).await;
        tx.push(2).await;
        tx.push(3).await; // drops 1
        assert_eq!(rx.recv().await, 2);
        assert_eq!(rx.recv().await, 3);
        assert_eq!(tx.dropped_count(), 1);
    }

    #[tokio::test]
    async fn preserves_fifo_order_under_capacity() {
        let (tx, mut rx) = channel::<i32>(5);
        for i in 0..3 {
            tx.push(i).await;
        }
        assert_eq!(rx.recv().await, 0);
        assert_eq!(rx.recv().await, 1);
        assert_eq!(rx.recv().await, 2);
        assert_eq!(tx.dropped_count(), 0);
    }
}
