// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A FIFO queue of parked tasks, the building block every
//! primitive in this module (`Mutex`, `Semaphore`, `Channel`) parks and
//! wakes waiters through.
//!
//! An intrusive, pinned doubly-linked list of waiters would make cancelling
//! a wait an O(1) unlink. This version keeps a plain `VecDeque<Arc<Waiter>>`
//! instead, trading that O(1) removal for an implementation with no unsafe
//! code, the same trade this crate makes for the timer wheel.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

use crate::error::Closed;

struct Waiter {
    signaled: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl Waiter {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            signaled: AtomicBool::new(false),
            waker: Mutex::new(None),
        })
    }

    /// Marks this waiter as runnable and invokes its stored waker, if it
    /// still has one (it might not, if the task re-registered a different
    /// waker after storing this one but before being woken).
    fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
        if let Some(waker) = self.waker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            waker.wake();
        }
    }
}

struct State {
    closed: bool,
    waiters: VecDeque<Arc<Waiter>>,
}

pub(crate) struct WaitQueue {
    state: Mutex<State>,
}

impl WaitQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                closed: false,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Wakes the longest-waiting task, if any.
    pub(crate) fn wake_one(&self) {
        let waiter = self.lock().waiters.pop_front();
        if let Some(waiter) = waiter {
            waiter.signal();
        }
    }

    /// Wakes every currently-waiting task, e.g. because a release made
    /// several distinct requests satisfiable at once and the queue can't
    /// tell which ones without threading size information through every
    /// `wait()` call.
    pub(crate) fn wake_all(&self) {
        let waiters = std::mem::take(&mut self.lock().waiters);
        for waiter in waiters {
            waiter.signal();
        }
    }

    /// Closes the queue and wakes everyone currently waiting; every future
    /// `wait()` call resolves immediately with `Err(Closed)`.
    pub(crate) fn close(&self) {
        let waiters = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            waiter.signal();
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Returns a future that resolves once this queue wakes it.
    ///
    /// Registration happens here, synchronously, rather than on the
    /// future's first poll: a caller doing `if !try_op() { queue.wait().await }`
    /// must be in the queue *before* it re-checks `try_op`, or a release
    /// racing between the check and the registration wakes a queue that
    /// doesn't contain the waiting task yet and the wakeup is lost.
    pub(crate) fn wait(&self) -> Wait<'_> {
        let mut state = self.lock();
        if state.closed {
            return Wait { queue: self, waiter: None, closed: true };
        }
        let waiter = Waiter::new();
        state.waiters.push_back(Arc::clone(&waiter));
        drop(state);
        Wait { queue: self, waiter: Some(waiter), closed: false }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A registration on a [`WaitQueue`], already enqueued by the time
/// [`WaitQueue::wait`] returns it. Dropping this before it resolves removes
/// its waiter from the queue, so a cancelled wait never occupies a slot it
/// will never consume.
pub(crate) struct Wait<'a> {
    queue: &'a WaitQueue,
    waiter: Option<Arc<Waiter>>,
    closed: bool,
}

impl Future for Wait<'_> {
    type Output = Result<(), Closed>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.closed {
            return Poll::Ready(Err(Closed(())));
        }

        let waiter = this.waiter.as_ref().expect("Wait was already registered by WaitQueue::wait");
        if waiter.signaled.load(Ordering::Acquire) {
            return if this.queue.is_closed() {
                Poll::Ready(Err(Closed(())))
            } else {
                Poll::Ready(Ok(()))
            };
        }
        let mut slot = waiter.waker.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_mut() {
            Some(existing) if existing.will_wake(cx.waker()) => {}
            _ => *slot = Some(cx.waker().clone()),
        }
        Poll::Pending
    }
}

impl Drop for Wait<'_> {
    fn drop(&mut self) {
        let Some(waiter) = self.waiter.take() else { return };
        if waiter.signaled.load(Ordering::Acquire) {
            // This task was handed the wakeup but is being dropped instead
            // of consuming it (e.g. a `select!` picked a different branch);
            // forward it so it isn't lost.
            self.queue.wake_one();
            return;
        }
        self.queue.lock().waiters.retain(|w| !Arc::ptr_eq(w, &waiter));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wake_one_runs_waiters_fifo() {
        crate::runtime::block_on(async {
            let queue = Arc::new(WaitQueue::new());
            let order = Arc::new(Mutex::new(Vec::new()));

            let mut handles = Vec::new();
            for i in 0..3 {
                let queue = Arc::clone(&queue);
                let order = Arc::clone(&order);
                handles.push(
                    crate::task::spawn(async move {
                        queue.wait().await.unwrap();
                        order.lock().unwrap().push(i);
                    })
                    .unwrap(),
                );
            }

            // Give every waiter a chance to register before waking them.
            for _ in 0..3 {
                crate::task::yield_now().await;
            }
            for _ in 0..3 {
                queue.wake_one();
            }
            for handle in handles {
                handle.await.unwrap();
            }

            assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        });
    }

    #[test]
    fn close_wakes_all_pending_waiters_with_closed() {
        crate::runtime::block_on(async {
            let queue = Arc::new(WaitQueue::new());
            let queue2 = Arc::clone(&queue);
            let handle = crate::task::spawn(async move { queue2.wait().await }).unwrap();
            crate::task::yield_now().await;
            queue.close();
            assert!(handle.await.unwrap().is_err());
        });
    }
}
