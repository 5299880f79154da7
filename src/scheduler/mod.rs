// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Scheduling: the bounded local run queue with its LIFO hot slot, the
//! global injection queue, and the [`Schedule`] trait a
//! [`crate::task::Task`] uses to reschedule itself.

mod queue;

use crate::task::TaskRef;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) use queue::{LocalQueue, Steal, Stealer};

/// Outcome of running a bounded batch of tasks off the local queue.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Tick {
    pub(crate) polled: usize,
    pub(crate) has_remaining: bool,
}

/// Anything a [`crate::task::Task`] can reschedule itself onto.
///
/// Implemented by [`Handle`] (push to wherever this task was spawned) and by
/// test-only stub schedulers.
pub(crate) trait Schedule: Send + Sync + 'static {
    fn schedule(&self, task: TaskRef);

    /// Whether new spawns onto this scheduler should be rejected. Only
    /// [`Handle`] (the scheduler real tasks run on) can become closed;
    /// test-only stub schedulers stay open for their whole lifetime.
    fn is_closed(&self) -> bool {
        false
    }
}

/// The process-wide injection queue tasks land on when spawned from outside
/// a worker thread, or overflow to when a local queue is full.
pub(crate) struct Injector {
    queue: crossbeam_deque::Injector<TaskRef>,
    len: AtomicUsize,
}

impl Injector {
    pub(crate) fn new() -> Self {
        Self {
            queue: crossbeam_deque::Injector::new(),
            len: AtomicUsize::new(0),
        }
    }

    pub(crate) fn push(&self, task: TaskRef) {
        self.len.fetch_add(1, Ordering::Relaxed);
        self.queue.push(task);
    }

    pub(crate) fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Steals a bounded batch of tasks (at most `limit`) into a worker's
    /// local queue, popping and returning one of them directly for
    /// immediate execution. `len` is decremented by one; it is best-effort
    /// metrics bookkeeping, not relied on for correctness (crossbeam's
    /// deque is the source of truth for what is actually queued).
    pub(crate) fn steal_into(&self, dest: &LocalQueue, limit: usize) -> Option<TaskRef> {
        loop {
            match self.queue.steal_batch_with_limit_and_pop(dest.raw(), limit) {
                crossbeam_deque::Steal::Success(task) => {
                    self.len.fetch_sub(1, Ordering::Relaxed);
                    return Some(task);
                }
                crossbeam_deque::Steal::Retry => continue,
                crossbeam_deque::Steal::Empty => return None,
            }
        }
    }
}

/// A handle tasks use to reschedule themselves: prefers the local queue of
/// whatever worker is currently running (cache-friendly), and falls back to
/// the global injector plus an unpark otherwise.
#[derive(Clone)]
pub(crate) struct Handle {
    pub(crate) injector: Arc<Injector>,
    pub(crate) unparker: Arc<dyn Fn() + Send + Sync>,
    /// Shared with the owning [`crate::executor::Executor`]; flipped by
    /// `Runtime::shutdown`/`Drop` so new spawns are rejected instead of
    /// silently queued where nothing will ever drain them.
    pub(crate) stop: Arc<AtomicBool>,
}

impl Schedule for Handle {
    fn schedule(&self, task: TaskRef) {
        if !crate::context::try_schedule_local(&task) {
            self.injector.push(task);
        }
        (self.unparker)();
    }

    fn is_closed(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}
