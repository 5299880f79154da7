// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The spawned-task object.
//!
//! A spawned future is wrapped in a [`Task`], reference-counted through an
//! `Arc`. Scheduling code never sees the task's concrete future type: it
//! holds a [`TaskRef`] (`Arc<dyn RawTask>`), a trait object whose vtable is
//! supplied by the compiler instead of hand-assembled, so spawning many
//! differently-typed futures does not require a separate monomorphized
//! scheduler for each one.

mod builder;
mod id;
mod join_handle;
mod state;
mod yield_now;

use crate::scheduler::Schedule;
use join_handle::JoinOutput;
use state::{EndPoll, StartPoll, State};
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Wake, Waker};

pub use builder::TaskBuilder;
pub use id::Id;
pub use join_handle::{JoinError, JoinHandle};
pub use yield_now::yield_now;

/// Spawns `future` onto whichever runtime owns the calling thread, returning
/// a [`JoinHandle`] immediately. Equivalent to
/// `Runtime::spawn`, but usable from inside a task without threading a
/// `Runtime`/`Executor` reference through.
///
/// # Panics
/// Panics if called outside a Talon runtime.
#[track_caller]
pub fn spawn<F>(future: F) -> Result<JoinHandle<F::Output>, crate::error::SpawnError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    TaskBuilder::new(crate::context::current_handle()).spawn(future)
}

/// Builds and schedules a new task, returning both the type-erased handle
/// the scheduler tracks and the typed [`JoinHandle`] given back to the
/// caller.
pub(crate) fn spawn_with<F, S>(
    future: F,
    scheduler: S,
    id: Id,
    span: tracing::Span,
) -> (TaskRef, JoinHandle<F::Output>)
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    S: Schedule + Clone,
{
    let task = Task::new(future, id, scheduler.clone(), span);
    let task_ref = TaskRef::from_arc(Arc::clone(&task));
    let output: Arc<dyn JoinOutput<F::Output> + Send + Sync> = task.clone();
    let handle = JoinHandle {
        output,
        task: task_ref.clone(),
    };
    scheduler.schedule(task_ref.clone());
    (task_ref, handle)
}

/// A type-erased, reference-counted handle to a spawned task.
///
/// This is what the scheduler's run queues actually store and move around;
/// it is cheap to clone (an `Arc` bump) and carries no knowledge of the
/// wrapped future's concrete type.
#[derive(Clone)]
pub(crate) struct TaskRef(Arc<dyn RawTask>);

impl TaskRef {
    pub(crate) fn id(&self) -> Id {
        self.0.id()
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.0.state().is_complete()
    }

    /// Requests cancellation of the task.
    ///
    /// If the task is idle this wakes it so the scheduler observes the
    /// cancellation on its next poll; if it is already complete this is a
    /// no-op.
    pub(crate) fn cancel(&self) {
        if self.0.state().cancel() {
            Arc::clone(&self.0).enqueue();
        }
    }

    /// Runs one poll of the wrapped future, driving it to completion or back
    /// to `Pending`. Called by worker loops only.
    pub(crate) fn run(self) {
        self.0.run();
    }

    fn from_arc<T: RawTask>(arc: Arc<T>) -> Self {
        Self(arc)
    }
}

impl fmt::Debug for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRef").field("id", &self.id()).finish()
    }
}

impl PartialEq for TaskRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for TaskRef {}

/// Object-safe interface a scheduler uses to drive and wake an erased task.
///
/// Implemented by [`Task<F, S>`] for every future/scheduler pair; never
/// implemented outside this module.
pub(crate) trait RawTask: Send + Sync + 'static {
    fn id(&self) -> Id;
    fn state(&self) -> &State;
    /// Pushes this task back onto whatever scheduler it was spawned on. Used
    /// both by the `Wake` impl below and by `TaskRef::cancel`.
    fn enqueue(self: Arc<Self>);
    fn run(self: Arc<Self>);
}

enum Stage<F: Future> {
    Pending(F),
    Ready(Result<F::Output, JoinError>),
    Consumed,
}

/// A spawned future plus the bookkeeping the scheduler and a [`JoinHandle`]
/// need around it.
struct Task<F: Future, S: Schedule> {
    id: Id,
    state: State,
    span: tracing::Span,
    scheduler: S,
    /// Guarded in practice by `state`'s `POLLING` bit (only the thread that
    /// wins `start_poll` touches this), but wrapped in a `Mutex` rather than
    /// an `UnsafeCell` so the invariant is enforced instead of merely
    /// documented.
    stage: Mutex<Stage<F>>,
    join_waker: Mutex<Option<Waker>>,
}

impl<F, S> Task<F, S>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    S: Schedule,
{
    fn new(future: F, id: Id, scheduler: S, span: tracing::Span) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: State::new(),
            span,
            scheduler,
            stage: Mutex::new(Stage::Pending(future)),
            join_waker: Mutex::new(None),
        })
    }

    fn poll_inner(&self, cx: &mut Context<'_>) -> Poll<()> {
        let _span = self.span.enter();
        let mut stage = self.stage.lock().unwrap_or_else(|e| e.into_inner());
        let Stage::Pending(future) = &mut *stage else {
            unreachable!("poll_inner called on a non-pending stage");
        };
        // SAFETY: the future is never moved out of the `Arc` it lives in for
        // the duration of this poll; `stage` is replaced in place below.
        let future = unsafe { Pin::new_unchecked(future) };
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| future.poll(cx)));
        match result {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(output)) => {
                *stage = Stage::Ready(Ok(output));
                Poll::Ready(())
            }
            Err(payload) => {
                *stage = Stage::Ready(Err(JoinError::Panic(payload)));
                Poll::Ready(())
            }
        }
    }

    fn wake_join_waker(&self) {
        if let Some(waker) = self.join_waker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            waker.wake();
        }
    }

    /// Polls for join-handle purposes: takes the output once it's ready,
    /// otherwise registers `cx`'s waker to be notified on completion.
    fn poll_join(&self, cx: &mut Context<'_>) -> Poll<Result<F::Output, JoinError>> {
        if self.state.is_complete() {
            let mut stage = self.stage.lock().unwrap_or_else(|e| e.into_inner());
            return match std::mem::replace(&mut *stage, Stage::Consumed) {
                Stage::Ready(output) => Poll::Ready(output),
                Stage::Consumed => panic!("JoinHandle polled after it already returned Ready"),
                Stage::Pending(_) => unreachable!("state says complete but stage is pending"),
            };
        }
        if self.state.is_cancelled() {
            return Poll::Ready(Err(JoinError::Cancelled));
        }
        let mut waker_slot = self.join_waker.lock().unwrap_or_else(|e| e.into_inner());
        match waker_slot.as_mut() {
            Some(existing) if existing.will_wake(cx.waker()) => {}
            _ => *waker_slot = Some(cx.waker().clone()),
        }
        Poll::Pending
    }
}

impl<F, S> JoinOutput<F::Output> for Task<F, S>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    S: Schedule,
{
    fn poll_join(&self, cx: &mut Context<'_>) -> Poll<Result<F::Output, JoinError>> {
        Task::poll_join(self, cx)
    }
}

/// Lets an `Arc<Task<F, S>>` be turned directly into a [`std::task::Waker`]
/// via `Waker::from`, instead of hand-assembling a `RawWakerVTable` as a
/// no_std crate would have to.
impl<F, S> Wake for Task<F, S>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    S: Schedule,
{
    fn wake(self: Arc<Self>) {
        if self.state().mark_woken() {
            self.enqueue();
        }
    }

    fn wake_by_ref(self: &Arc<Self>) {
        if self.state().mark_woken() {
            // `mark_woken` only returns `true` once per idle->scheduled
            // cycle and only when the task isn't currently mid-poll, so
            // this can't double-enqueue a task already on a run queue.
            Arc::clone(self).enqueue();
        }
    }
}

impl<F, S> RawTask for Task<F, S>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    S: Schedule,
{
    fn id(&self) -> Id {
        self.id
    }

    fn state(&self) -> &State {
        &self.state
    }

    fn enqueue(self: Arc<Self>) {
        let task_ref = TaskRef::from_arc(Arc::clone(&self));
        self.scheduler.schedule(task_ref);
    }

    fn run(self: Arc<Self>) {
        loop {
            match self.state.start_poll() {
                StartPoll::Busy => return,
                StartPoll::AlreadyComplete => return,
                StartPoll::Poll => {}
            }

            let waker: Waker = Arc::clone(&self).into();
            let mut cx = Context::from_waker(&waker);
            let poll = self.poll_inner(&mut cx);

            match self.state.end_poll(poll.is_ready()) {
                EndPoll::Ready => {
                    self.wake_join_waker();
                    return;
                }
                EndPoll::Pending => return,
                EndPoll::PendingScheduleSelf => continue,
            }
        }
    }
}
