// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! An async counting semaphore: a permit
//! counter plus a wait queue.

use super::wait_queue::WaitQueue;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A counting semaphore: `acquire(n)` suspends the calling task until `n`
/// permits are available, `release(n)` returns them.
pub struct Semaphore {
    permits: AtomicUsize,
    waiters: WaitQueue,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: AtomicUsize::new(permits),
            waiters: WaitQueue::new(),
        }
    }

    pub fn available_permits(&self) -> usize {
        self.permits.load(Ordering::Acquire)
    }

    /// Waits until `n` permits are available, then takes them.
    pub async fn acquire(&self, n: usize) -> SemaphorePermit<'_> {
        loop {
            // Register before checking, so a concurrent `release` can't run
            // to completion (and find no one to wake) in the gap between
            // this check failing and the registration that should catch it.
            let wait = self.waiters.wait();
            if self.try_acquire(n) {
                return SemaphorePermit { semaphore: self, n };
            }
            let _ = wait.await;
        }
    }

    pub fn try_acquire(&self, n: usize) -> bool {
        let mut current = self.permits.load(Ordering::Acquire);
        loop {
            if current < n {
                return false;
            }
            match self.permits.compare_exchange_weak(
                current,
                current - n,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Returns `n` permits and wakes every waiter, since a generic
    /// `WaitQueue` doesn't carry each waiter's requested count: whichever
    /// woken task's `try_acquire` still fails re-registers and waits again.
    pub fn release(&self, n: usize) {
        if n == 0 {
            return;
        }
        self.permits.fetch_add(n, Ordering::AcqRel);
        self.waiters.wake_all();
    }
}

/// An RAII handle to `n` acquired permits; returns them to the semaphore on
/// drop.
#[must_use = "if unused the permits are immediately released"]
pub struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
    n: usize,
}

impl SemaphorePermit<'_> {
    /// Releases the permits early without waiting for the guard to drop.
    pub fn release(self) {
        drop(self);
    }

    /// Permanently removes these permits from the semaphore instead of
    /// returning them.
    pub fn forget(self) {
        std::mem::forget(self);
    }
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        self.semaphore.release(self.n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize as Counter;

    #[test]
    fn never_admits_more_than_the_permit_count() {
        crate::runtime::block_on(async {
            let semaphore = Arc::new(Semaphore::new(2));
            let concurrent = Arc::new(Counter::new(0));
            let max_concurrent = Arc::new(Counter::new(0));

            let mut handles = Vec::new();
            for _ in 0..20 {
                let semaphore = Arc::clone(&semaphore);
                let concurrent = Arc::clone(&concurrent);
                let max_concurrent = Arc::clone(&max_concurrent);
                handles.push(
                    crate::task::spawn(async move {
                        let _permit = semaphore.acquire(1).await;
                        let now = concurrent.fetch_add(1, Ordering::AcqRel) + 1;
                        max_concurrent.fetch_max(now, Ordering::AcqRel);
                        crate::task::yield_now().await;
                        concurrent.fetch_sub(1, Ordering::AcqRel);
                    })
                    .unwrap(),
                );
            }
            for handle in handles {
                handle.await.unwrap();
            }
            assert!(max_concurrent.load(Ordering::Acquire) <= 2);
            assert_eq!(semaphore.available_permits(), 2);
        });
    }

    #[test]
    fn try_acquire_fails_when_insufficient_permits_remain() {
        crate::runtime::block_on(async {
            let semaphore = Semaphore::new(1);
            assert!(!semaphore.try_acquire(2));
            let permit = semaphore.acquire(1).await;
            assert!(!semaphore.try_acquire(1));
            drop(permit);
            assert!(semaphore.try_acquire(1));
        });
    }
}
