//! Bounded FIFO work queue
//!
//! Enqueue never waits: a full queue hands the item back. Dequeue suspends
//! until an item is available. The queue also tracks unfinished work (items
//! enqueued but not yet marked done) so callers can [`join`](BoundedQueue::join)
//! until everything has been processed.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

struct QueueState<T> {
    items: VecDeque<T>,
    unfinished: usize,
}

/// FIFO queue with an optional capacity (0 = unbounded)
pub(crate) struct BoundedQueue<T> {
    capacity: usize,
    state: Mutex<QueueState<T>>,
    available: Notify,
    drained: Notify,
}

impl<T> BoundedQueue<T> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                unfinished: 0,
            }),
            available: Notify::new(),
            drained: Notify::new(),
        }
    }

    /// Capacity, 0 when unbounded
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items waiting to be dequeued
    pub(crate) fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Items enqueued and not yet marked done
    pub(crate) fn unfinished(&self) -> usize {
        self.state.lock().unfinished
    }

    /// Enqueue without waiting; returns the item back if the queue is full
    pub(crate) fn try_push(&self, item: T) -> Result<(), T> {
        {
            let mut state = self.state.lock();
            if self.capacity > 0 && state.items.len() >= self.capacity {
                return Err(item);
            }
            state.items.push_back(item);
            state.unfinished += 1;
        }
        self.available.notify_one();
        Ok(())
    }

    /// Dequeue without waiting
    pub(crate) fn try_pop(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /// Dequeue, waiting until an item is available
    pub(crate) async fn pop(&self) -> T {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_pop() {
                return item;
            }
            notified.await;
        }
    }

    /// Mark one dequeued item as fully processed
    pub(crate) fn task_done(&self) {
        let finished = {
            let mut state = self.state.lock();
            debug_assert!(state.unfinished > 0, "task_done called too many times");
            state.unfinished = state.unfinished.saturating_sub(1);
            state.unfinished == 0
        };
        if finished {
            self.drained.notify_waiters();
        }
    }

    /// Wait until every enqueued item has been marked done
    pub(crate) async fn join(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.unfinished() == 0 {
                return;
            }
            notified.await;
        }
    }
}
