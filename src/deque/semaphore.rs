// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A classic counting semaphore: `wait` blocks while the count is zero,
/// `notify` increments it and wakes one waiter.
///
/// Mirrors `include/thread.h`'s POSIX `sem_t`-backed `Semaphore`, realized
/// here with a `parking_lot` mutex and condvar instead of `sem_t` directly.
pub struct Semaphore {
    count: Mutex<i64>,
    condvar: Condvar,
}

impl Semaphore {
    pub fn new(initial: i64) -> Self {
        Self {
            count: Mutex::new(initial),
            condvar: Condvar::new(),
        }
    }

    /// Blocks until the count is greater than zero, then decrements it.
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.condvar.wait(&mut count);
        }
        *count -= 1;
    }

    /// Blocks until the count is greater than zero or `timeout` elapses.
    /// Returns `true` if the count was decremented, `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count.lock();
        while *count == 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let result = self.condvar.wait_for(&mut count, remaining);
            if result.timed_out() && *count == 0 {
                return false;
            }
        }
        *count -= 1;
        true
    }

    /// Decrements the count without blocking if it is greater than zero.
    pub fn try_wait(&self) -> bool {
        let mut count = self.count.lock();
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }

    /// Increments the count and wakes one waiter.
    pub fn notify(&self) {
        let mut count = self.count.lock();
        *count += 1;
        self.condvar.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn try_wait_on_empty_fails() {
        let sem = Semaphore::new(0);
        assert!(!sem.try_wait());
    }

    #[test]
    fn notify_then_wait_succeeds() {
        let sem = Semaphore::new(0);
        sem.notify();
        assert!(sem.try_wait());
    }

    #[test]
    fn wait_timeout_expires_without_notify() {
        let sem = Semaphore::new(0);
        assert!(!sem.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn notify_wakes_blocked_waiter() {
        let sem = Arc::new(Semaphore::new(0));
        let producer = Arc::clone(&sem);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.notify();
        });
        sem.wait();
        handle.join().unwrap();
    }
}
