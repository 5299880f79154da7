// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! [`JoinHandle`], the future returned by `spawn`.

use super::{Id, TaskRef};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Why a [`JoinHandle`] did not resolve to the task's normal output.
#[derive(Debug)]
pub enum JoinError {
    /// The task was cancelled (via [`JoinHandle::abort`] or the runtime
    /// shutting down) before it completed.
    Cancelled,
    /// The task's future panicked while being polled.
    Panic(Box<dyn Any + Send + 'static>),
}

impl JoinError {
    /// Returns `true` if the task was cancelled rather than having panicked.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, JoinError::Cancelled)
    }

    /// Re-raises a panic payload, or panics with a generic message if the
    /// task was cancelled instead of panicking.
    pub fn into_panic(self) -> Box<dyn Any + Send + 'static> {
        match self {
            JoinError::Panic(payload) => payload,
            JoinError::Cancelled => Box::new("called `JoinError::into_panic` on a cancelled task"),
        }
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::Cancelled => f.write_str("task was cancelled"),
            JoinError::Panic(_) => f.write_str("task panicked"),
        }
    }
}

impl std::error::Error for JoinError {}

/// Internal, output-typed erasure that lets [`JoinHandle<T>`] hold a task
/// without naming its future or scheduler type.
pub(crate) trait JoinOutput<T>: Send + Sync {
    fn poll_join(&self, cx: &mut Context<'_>) -> Poll<Result<T, JoinError>>;
}

/// A handle to a spawned task, yielding its output once the task completes.
///
/// Dropping a `JoinHandle` does not cancel the task; call [`JoinHandle::abort`]
/// first if that's what you want.
pub struct JoinHandle<T> {
    pub(crate) output: std::sync::Arc<dyn JoinOutput<T> + Send + Sync>,
    pub(crate) task: TaskRef,
}

impl<T> JoinHandle<T> {
    pub fn id(&self) -> Id {
        self.task.id()
    }

    /// Requests cancellation of the underlying task.
    ///
    /// The task may still run to completion if it was already mid-poll when
    /// this is called; awaiting the handle afterwards resolves to
    /// `Err(JoinError::Cancelled)` unless the task won that race.
    pub fn abort(&self) {
        self.task.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_complete()
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = Result<T, JoinError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.output.poll_join(cx)
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle").field("id", &self.id()).finish()
    }
}
