// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

struct Node<T> {
    next: AtomicPtr<Node<T>>,
    data: T,
}

/// A lock-free singly-linked list supporting concurrent `prepend`, `append`,
/// and `take_front`.
///
/// `head` and `tail` are each swung into place with a single CAS per
/// operation. Insertion at an arbitrary `prev_next` location (used by both
/// `prepend`, which targets `head`, and `append`, which targets the observed
/// tail's `next`) is a Treiber-stack-style push: on contention at the same
/// location, losers simply get linked ahead of the winner rather than lost,
/// so no element is ever dropped, though the final order among contending
/// inserts is racy. `tail` itself is advisory and is corrected
/// opportunistically by walking forward along `next` after each insert;
/// traversal correctness never depends on `tail` being exact.
pub struct AtomicLinkedList<T> {
    head: AtomicPtr<Node<T>>,
    tail: AtomicPtr<Node<T>>,
    len: AtomicUsize,
}

impl<T> AtomicLinkedList<T> {
    pub fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            tail: AtomicPtr::new(ptr::null_mut()),
            len: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// CAS-links `new_node` at `prev_next`, retrying with the observed
    /// current value on failure until the CAS succeeds.
    fn link(new_node: *mut Node<T>, prev_next: &AtomicPtr<Node<T>>) {
        let mut pn = prev_next.load(Ordering::Acquire);
        loop {
            unsafe {
                (*new_node).next.store(pn, Ordering::Relaxed);
            }
            match prev_next.compare_exchange_weak(
                pn,
                new_node,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => pn = actual,
            }
        }
    }

    /// Walks `tail` forward from the observed value `t` toward the true end
    /// of the `next` chain, swinging it along the way. Best-effort: gives up
    /// as soon as it reaches a node whose `next` is null.
    fn fix_tail(mut t: *mut Node<T>, tail: &AtomicPtr<Node<T>>) {
        let mut n = unsafe { (*t).next.load(Ordering::Acquire) };
        while !n.is_null() {
            match tail.compare_exchange_weak(t, n, Ordering::Release, Ordering::Acquire) {
                Ok(_) => t = n,
                Err(actual) => t = actual,
            }
            n = unsafe { (*t).next.load(Ordering::Acquire) };
        }
    }

    fn link_with_tail(
        new_node: *mut Node<T>,
        prev_next: &AtomicPtr<Node<T>>,
        tail: &AtomicPtr<Node<T>>,
    ) {
        Self::link(new_node, prev_next);
        let mut t: *mut Node<T> = ptr::null_mut();
        if let Err(actual) =
            tail.compare_exchange_weak(t, new_node, Ordering::Release, Ordering::Acquire)
        {
            t = actual;
            if !t.is_null() {
                Self::fix_tail(t, tail);
            }
        }
    }

    pub fn prepend(&self, value: T) {
        let node = Box::into_raw(Box::new(Node {
            next: AtomicPtr::new(ptr::null_mut()),
            data: value,
        }));
        Self::link_with_tail(node, &self.head, &self.tail);
        self.len.fetch_add(1, Ordering::AcqRel);
    }

    pub fn append(&self, value: T) {
        let node = Box::into_raw(Box::new(Node {
            next: AtomicPtr::new(ptr::null_mut()),
            data: value,
        }));
        let t = self.tail.load(Ordering::Acquire);
        if t.is_null() {
            Self::link_with_tail(node, &self.head, &self.tail);
        } else {
            unsafe {
                Self::link_with_tail(node, &(*t).next, &self.tail);
            }
        }
        self.len.fetch_add(1, Ordering::AcqRel);
    }

    /// Pops the front element if one is present without blocking or
    /// spinning on contention; used by
    /// [`BlockingDeque`](crate::deque::BlockingDeque) which already bounds
    /// retries with a semaphore permit.
    pub fn try_take_front(&self) -> Option<T> {
        loop {
            let h = self.head.load(Ordering::Acquire);
            if h.is_null() {
                return None;
            }
            let n = unsafe { (*h).next.load(Ordering::Acquire) };
            match self
                .head
                .compare_exchange_weak(h, n, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    if n.is_null() {
                        let _ = self.tail.compare_exchange(
                            h,
                            ptr::null_mut(),
                            Ordering::Release,
                            Ordering::Relaxed,
                        );
                    }
                    self.len.fetch_sub(1, Ordering::AcqRel);
                    let boxed = unsafe { Box::from_raw(h) };
                    return Some(boxed.data);
                }
                Err(_) => continue,
            }
        }
    }

    /// Spins until an element is available, then removes and returns it.
    pub fn take_front(&self) -> T {
        loop {
            if let Some(v) = self.try_take_front() {
                return v;
            }
            std::hint::spin_loop();
        }
    }
}

impl<T> Default for AtomicLinkedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for AtomicLinkedList<T> {
    fn drop(&mut self) {
        while self.try_take_front().is_some() {}
    }
}

unsafe impl<T: Send> Send for AtomicLinkedList<T> {}
unsafe impl<T: Send> Sync for AtomicLinkedList<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn append_then_take_front_is_fifo() {
        let list = AtomicLinkedList::new();
        list.append(1);
        list.append(2);
        list.append(3);
        assert_eq!(list.take_front(), 1);
        assert_eq!(list.take_front(), 2);
        assert_eq!(list.take_front(), 3);
        assert!(list.is_empty());
    }

    #[test]
    fn prepend_is_lifo_at_head() {
        let list = AtomicLinkedList::new();
        list.prepend(1);
        list.prepend(2);
        assert_eq!(list.take_front(), 2);
        assert_eq!(list.take_front(), 1);
    }

    #[test]
    fn concurrent_appends_preserve_all_elements() {
        let list = Arc::new(AtomicLinkedList::new());
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let list = Arc::clone(&list);
                thread::spawn(move || {
                    for i in 0..200 {
                        list.append(t * 200 + i);
                    }
                })
            })
            .collect();
        for h in threads {
            h.join().unwrap();
        }
        assert_eq!(list.len(), 1600);
        let mut seen = Vec::new();
        while let Some(v) = list.try_take_front() {
            seen.push(v);
        }
        seen.sort_unstable();
        let expected: Vec<_> = (0..1600).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn try_take_front_on_empty_returns_none() {
        let list: AtomicLinkedList<i32> = AtomicLinkedList::new();
        assert!(list.try_take_front().is_none());
    }
}
