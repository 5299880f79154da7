// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A single worker's local run queue: a bounded Chase-Lev work-stealing
//! deque (via `crossbeam-deque`) fronted by a single-slot LIFO "hot slot".

use crate::task::TaskRef;
use crossbeam_deque::Worker;
use std::cell::Cell;

pub(crate) use crossbeam_deque::Steal;

/// Owned only by the worker thread it belongs to; other workers reach it
/// through [`Stealer`].
pub(crate) struct LocalQueue {
    deque: Worker<TaskRef>,
    /// The single task most likely to run next: whatever this worker's
    /// currently-running task most recently woke. Checked before the deque
    /// on every pop, so a producer/consumer pair of tasks tends to stay on
    /// the same core back-to-back instead of round-tripping through the
    /// deque or another worker.
    hot_slot: Cell<Option<TaskRef>>,
    capacity: usize,
    lifo_slot_enabled: bool,
}

/// A handle other workers use to steal from this queue. Cloneable, `Send +
/// Sync`; does not see the hot slot (it is single-owner by design).
#[derive(Clone)]
pub(crate) struct Stealer(crossbeam_deque::Stealer<TaskRef>);

impl LocalQueue {
    pub(crate) fn new(capacity: usize, lifo_slot_enabled: bool) -> Self {
        Self {
            deque: Worker::new_lifo(),
            hot_slot: Cell::new(None),
            capacity,
            lifo_slot_enabled,
        }
    }

    pub(crate) fn stealer(&self) -> Stealer {
        Stealer(self.deque.stealer())
    }

    pub(crate) fn raw(&self) -> &Worker<TaskRef> {
        &self.deque
    }

    pub(crate) fn is_empty(&self) -> bool {
        !self.peek_hot_is_some() && self.deque.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.deque.len() + usize::from(self.peek_hot_is_some())
    }

    fn peek_hot_is_some(&self) -> bool {
        let slot = self.hot_slot.take();
        let is_some = slot.is_some();
        self.hot_slot.set(slot);
        is_some
    }

    /// Pushes a freshly spawned or overflow-returned task to the back of
    /// the deque, spilling to `overflow` (the global injector) once this
    /// queue is at capacity so a single bursty spawner can't starve
    /// stealers of visibility into its work.
    pub(crate) fn push_back(&self, task: TaskRef, overflow: &super::Injector) {
        if self.deque.len() >= self.capacity {
            overflow.push(task);
        } else {
            self.deque.push(task);
        }
    }

    /// Installs `task` as the new hot slot, demoting whatever was there
    /// (if anything) to the back of the deque. A no-op wrapper around
    /// `push_back` when the hot slot is disabled for this runtime.
    pub(crate) fn push_hot(&self, task: TaskRef, overflow: &super::Injector) {
        if !self.lifo_slot_enabled {
            self.push_back(task, overflow);
            return;
        }
        if let Some(evicted) = self.hot_slot.replace(Some(task)) {
            self.push_back(evicted, overflow);
        }
    }

    pub(crate) fn pop(&self) -> Option<TaskRef> {
        if let Some(task) = self.hot_slot.take() {
            return Some(task);
        }
        self.deque.pop()
    }
}

impl Stealer {
    pub(crate) fn steal(&self) -> Steal<TaskRef> {
        self.0.steal()
    }

    /// Steals up to `limit` tasks from the victim's queue into `dest`,
    /// always taking at least one task if the victim has any.
    pub(crate) fn steal_half(&self, dest: &LocalQueue, limit: usize) -> Steal<TaskRef> {
        self.0.steal_batch_with_limit_and_pop(dest.raw(), limit)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
