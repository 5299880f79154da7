// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Thread-local handles to whichever runtime owns the current thread.
//!
//! Four independent pieces of context live here, all published together by
//! [`enter_worker`] for the duration of a worker's run loop: the worker's
//! local run queue (so a waker firing here can push directly into this
//! worker's hot slot instead of going through the global injector), the
//! runtime's [`Timer`] (so [`crate::time::sleep`] can register against it
//! without the caller threading a handle through every async function), the
//! runtime's [`Handle`] (so the free function [`crate::spawn`] can
//! reschedule onto the right executor), and the runtime's [`Reactor`] (so
//! [`crate::reactor::ops`] types can register themselves without the caller
//! threading one through).

use crate::reactor::Reactor;
use crate::scheduler::{Handle, Injector, LocalQueue};
use crate::time::Timer;
use std::sync::Arc;

struct WorkerContext {
    queue: *const LocalQueue,
    injector: *const Injector,
    timer: Arc<Timer>,
    handle: Handle,
    reactor: Arc<Reactor>,
}

thread_local! {
    static WORKER: RefCellContext = const { RefCellContext::new() };
}

struct RefCellContext(std::cell::RefCell<Option<WorkerContext>>);

impl RefCellContext {
    const fn new() -> Self {
        Self(std::cell::RefCell::new(None))
    }
}

/// Runs `f` with the calling thread's local queue, timer, and scheduler
/// handle published for the duration of the call. Used by a worker thread
/// (or the thread calling `Runtime::block_on`) to wrap its run loop.
pub(crate) fn enter_worker<R>(
    queue: &LocalQueue,
    injector: &Injector,
    timer: Arc<Timer>,
    handle: Handle,
    reactor: Arc<Reactor>,
    f: impl FnOnce() -> R,
) -> R {
    let previous = WORKER.with(|cell| {
        cell.0.borrow_mut().replace(WorkerContext {
            queue: queue as *const LocalQueue,
            injector: injector as *const Injector,
            timer,
            handle,
            reactor,
        })
    });
    struct Restore(Option<WorkerContext>);
    impl Drop for Restore {
        fn drop(&mut self) {
            WORKER.with(|cell| *cell.0.borrow_mut() = self.0.take());
        }
    }
    let _restore = Restore(previous);
    f()
}

/// Pushes `task` onto the calling thread's worker queue if it is in fact
/// running inside a worker loop. Returns `false` (and does nothing) when
/// called from outside any worker, so the caller can fall back to the
/// global injector.
///
/// # Safety
/// The raw pointers stashed in [`WorkerContext`] are only ever valid for the
/// duration of the `enter_worker` call that published them, and are always
/// cleared before that call returns (including on panic, via `enter_worker`'s
/// `Restore` guard), so a thread can never observe a dangling pointer here.
pub(crate) fn try_schedule_local(task: &crate::task::TaskRef) -> bool {
    WORKER.with(|cell| {
        let borrowed = cell.0.borrow();
        let Some(ctx) = borrowed.as_ref() else {
            return false;
        };
        // SAFETY: see doc comment above.
        let queue = unsafe { &*ctx.queue };
        let injector = unsafe { &*ctx.injector };
        queue.push_hot(task.clone(), injector);
        true
    })
}

/// The current thread's runtime timer.
///
/// # Panics
/// Panics if called outside a Talon runtime.
pub(crate) fn current_timer() -> Arc<Timer> {
    WORKER.with(|cell| {
        cell.0
            .borrow()
            .as_ref()
            .map(|ctx| Arc::clone(&ctx.timer))
            .expect("there is no timer running, must be called from the context of a Talon runtime")
    })
}

/// The scheduler handle for whichever runtime owns the current thread, used
/// by the free function [`crate::spawn`] so callers inside a task don't need
/// to carry a `Runtime`/`Executor` reference around.
///
/// # Panics
/// Panics if called outside a Talon runtime.
pub(crate) fn current_handle() -> Handle {
    WORKER.with(|cell| {
        cell.0
            .borrow()
            .as_ref()
            .map(|ctx| ctx.handle.clone())
            .expect("there is no runtime running, must be called from the context of a Talon runtime")
    })
}

/// The I/O reactor for whichever runtime owns the current thread, used by
/// [`crate::reactor::ops`] types to register themselves for readiness
/// events.
///
/// # Panics
/// Panics if called outside a Talon runtime.
pub(crate) fn current_reactor() -> Arc<Reactor> {
    WORKER.with(|cell| {
        cell.0
            .borrow()
            .as_ref()
            .map(|ctx| Arc::clone(&ctx.reactor))
            .expect("there is no runtime running, must be called from the context of a Talon runtime")
    })
}
