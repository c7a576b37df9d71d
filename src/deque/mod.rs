// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Double-ended queue primitives.
//!
//! [`Deque`] is the single-threaded FIFO/LIFO hybrid built directly on
//! [`list::LinkedList`](crate::list::LinkedList). [`BlockingDeque`] adds
//! cross-thread enqueue/dequeue on top of
//! [`list::AtomicLinkedList`](crate::list::AtomicLinkedList), using a
//! [`Semaphore`] to track outstanding elements and a `parking_lot::Mutex<()>`
//! to serialize structural mutation (the atomic list's own CAS guarantees
//! are per-operation, not across the semaphore-count/list-contents pair).
//! Every enqueue links its node before signaling the semaphore, so a woken
//! waiter is always guaranteed to find an element.

mod semaphore;

pub use semaphore::Semaphore;

use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::list::{AtomicLinkedList, LinkedList};

/// A single-threaded double-ended queue.
///
/// Supports O(1) enqueue/dequeue at either end via the underlying
/// [`list::LinkedList`](crate::list::LinkedList)'s cursor, matching
/// `spl::Deque`'s non-blocking API.
pub struct Deque<T> {
    list: LinkedList<T>,
}

impl<T> Deque<T> {
    pub fn new() -> Self {
        Self {
            list: LinkedList::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn front(&self) -> Option<&T> {
        self.list.front()
    }

    pub fn back(&self) -> Option<&T> {
        self.list.back()
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    pub fn enqueue_front(&mut self, value: T) {
        self.list.prepend(value);
    }

    pub fn enqueue(&mut self, value: T) {
        self.list.append(value);
    }

    /// Dequeues the front element.
    ///
    /// # Errors
    /// Returns [`Error::ElementNotFound`] if the queue is empty.
    pub fn dequeue(&mut self) -> Result<T> {
        self.list.pop_front().ok_or(Error::ElementNotFound)
    }
}

impl<T> Default for Deque<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread-safe double-ended queue with blocking dequeue.
///
/// Enqueue operations link onto the lock-free list first and only then
/// signal the semaphore, so a dequeuer that wakes from `wait()` is
/// guaranteed a node is present. `clear` is the one operation that takes
/// the structural mutex directly, since it must drain the list and reset
/// the semaphore count atomically with respect to concurrent enqueues.
pub struct BlockingDeque<T> {
    list: AtomicLinkedList<T>,
    sem: Semaphore,
    mutation: Mutex<()>,
}

impl<T> BlockingDeque<T> {
    pub fn new() -> Self {
        Self {
            list: AtomicLinkedList::new(),
            sem: Semaphore::new(0),
            mutation: Mutex::new(()),
        }
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn enqueue_front(&self, value: T) {
        self.list.prepend(value);
        self.sem.notify();
    }

    pub fn enqueue(&self, value: T) {
        self.list.append(value);
        self.sem.notify();
    }

    /// Blocks until an element is available, then dequeues it.
    pub fn dequeue(&self) -> T {
        self.sem.wait();
        self.list.take_front()
    }

    /// Blocks for up to `timeout`, dequeuing an element if one becomes
    /// available.
    ///
    /// # Errors
    /// Returns [`Error::DequeueTimedout`] if the timeout elapses first.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Result<T> {
        if !self.sem.wait_timeout(timeout) {
            return Err(Error::DequeueTimedout);
        }
        Ok(self.list.take_front())
    }

    /// Dequeues an element without blocking.
    ///
    /// # Errors
    /// Returns [`Error::ElementNotFound`] if the queue is currently empty.
    pub fn try_dequeue(&self) -> Result<T> {
        if !self.sem.try_wait() {
            return Err(Error::ElementNotFound);
        }
        Ok(self.list.take_front())
    }

    /// Drains all elements, resetting the semaphore count to zero.
    pub fn clear(&self) {
        let _guard = self.mutation.lock();
        while self.sem.try_wait() {
            self.list.take_front();
        }
    }
}

impl<T> Default for BlockingDeque<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn deque_enqueue_dequeue_is_fifo() {
        let mut dq = Deque::new();
        dq.enqueue(1);
        dq.enqueue(2);
        dq.enqueue_front(0);
        assert_eq!(dq.dequeue().unwrap(), 0);
        assert_eq!(dq.dequeue().unwrap(), 1);
        assert_eq!(dq.dequeue().unwrap(), 2);
        assert!(matches!(dq.dequeue(), Err(Error::ElementNotFound)));
    }

    #[test]
    fn blocking_deque_try_dequeue_on_empty_errors() {
        let dq: BlockingDeque<i32> = BlockingDeque::new();
        assert!(matches!(dq.try_dequeue(), Err(Error::ElementNotFound)));
    }

    #[test]
    fn blocking_deque_dequeue_timeout_expires() {
        let dq: BlockingDeque<i32> = BlockingDeque::new();
        assert!(matches!(
            dq.dequeue_timeout(Duration::from_millis(5)),
            Err(Error::DequeueTimedout)
        ));
    }

    #[test]
    fn blocking_deque_wakes_waiting_consumer() {
        let dq = Arc::new(BlockingDeque::new());
        let producer = Arc::clone(&dq);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.enqueue(42);
        });
        assert_eq!(dq.dequeue(), 42);
        handle.join().unwrap();
    }

    #[test]
    fn blocking_deque_clear_drains_and_resets_semaphore() {
        let dq = BlockingDeque::new();
        dq.enqueue(1);
        dq.enqueue(2);
        dq.clear();
        assert!(dq.is_empty());
        assert!(matches!(dq.try_dequeue(), Err(Error::ElementNotFound)));
    }
}
