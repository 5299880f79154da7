// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! An async mutex: a locked flag plus a FIFO wait queue of wakers, the same
//! shape as a blocking mutex with the spin loop replaced by a `WaitQueue`
//! park.

use super::wait_queue::WaitQueue;
use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

/// A mutual-exclusion lock whose `lock()` future suspends the calling task
/// instead of spinning or blocking its worker thread.
pub struct Mutex<T: ?Sized> {
    locked: AtomicBool,
    waiters: WaitQueue,
    data: UnsafeCell<T>,
}

// SAFETY: a `Mutex<T>` only ever exposes `&mut T` to whichever task holds
// the single `MutexGuard`, the same way `std::sync::Mutex` does.
unsafe impl<T: ?Sized + Send> Send for Mutex<T> {}
unsafe impl<T: ?Sized + Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    pub fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            waiters: WaitQueue::new(),
            data: UnsafeCell::new(data),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> Mutex<T> {
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Acquires the lock, waiting until it becomes available.
    pub async fn lock(&self) -> MutexGuard<'_, T> {
        loop {
            // Register before checking: a concurrent unlock between this
            // check and a later registration could otherwise wake a queue
            // we hadn't joined yet, leaving us parked forever.
            let wait = self.waiters.wait();
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            // The wait queue on a `Mutex` is never closed, so a wait here
            // only ever resolves `Ok`; a woken task just means "try again",
            // not "you now hold the lock".
            let _ = wait.await;
        }
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| MutexGuard { mutex: self, _not_send: PhantomData })
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T: ?Sized + Default> Default for Mutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Mutex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Mutex");
        match self.try_lock() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &"<locked>"),
        };
        d.finish()
    }
}

/// RAII guard for a locked [`Mutex`]; unlocks and wakes the next waiter on
/// drop.
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, T: ?Sized> {
    mutex: &'a Mutex<T>,
    // The guard must not cross threads: the worker that drops it is the one
    // whose wake hands the lock's retry opportunity to the next waiter.
    _not_send: PhantomData<*mut ()>,
}

impl<T: ?Sized> Deref for MutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: holding a `MutexGuard` proves `locked` is `true` and that
        // this is the only guard in existence for this `Mutex`.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T: ?Sized> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: see `Deref`.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T: ?Sized> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.locked.store(false, Ordering::Release);
        self.mutex.waiters.wake_one();
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for MutexGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn mutual_exclusion_holds_under_contention() {
        crate::runtime::block_on(async {
            let mutex = Arc::new(Mutex::new(0usize));
            let mut handles = Vec::new();
            for _ in 0..50 {
                let mutex = Arc::clone(&mutex);
                handles.push(
                    crate::task::spawn(async move {
                        let mut guard = mutex.lock().await;
                        let observed = *guard;
                        crate::task::yield_now().await;
                        *guard = observed + 1;
                    })
                    .unwrap(),
                );
            }
            for handle in handles {
                handle.await.unwrap();
            }
            assert_eq!(*mutex.lock().await, 50);
        });
    }

    #[test]
    fn try_lock_fails_while_held() {
        crate::runtime::block_on(async {
            let mutex = Mutex::new(());
            let guard = mutex.lock().await;
            assert!(mutex.try_lock().is_none());
            drop(guard);
            assert!(mutex.try_lock().is_some());
        });
    }
}
