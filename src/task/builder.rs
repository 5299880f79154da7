// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::error::SpawnError;
use crate::scheduler::Schedule;
use crate::task::id::Id;
use crate::task::join_handle::JoinHandle;
use std::any::type_name;
use std::future::Future;
use std::panic::Location;

/// Configures optional metadata for a spawned task before handing its
/// future to a scheduler.
///
/// Most callers should use `Runtime::spawn`/`LocalScheduler::spawn` directly;
/// `TaskBuilder` exists for the handful of cases that want a name or a
/// specific `kind` string attached to the task's tracing span.
pub struct TaskBuilder<'a, S> {
    name: Option<&'a str>,
    kind: &'static str,
    location: Option<&'static Location<'static>>,
    scheduler: S,
}

impl<'a, S> TaskBuilder<'a, S>
where
    S: Schedule + Clone,
{
    pub(crate) fn new(scheduler: S) -> Self {
        Self {
            name: None,
            kind: "task",
            location: None,
            scheduler,
        }
    }

    /// Attach a name to tasks built by this builder, visible in `tracing`
    /// spans. Unnamed by default.
    pub fn name(mut self, name: &'a str) -> Self {
        self.name = Some(name);
        self
    }

    /// Override the `kind` field recorded in the task's span. Defaults to
    /// `"task"`; runtime internals use this to distinguish e.g. timers.
    pub fn kind(mut self, kind: &'static str) -> Self {
        self.kind = kind;
        self
    }

    #[track_caller]
    pub fn spawn<F>(self, future: F) -> Result<JoinHandle<F::Output>, SpawnError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.scheduler.is_closed() {
            return Err(SpawnError::Closed);
        }
        let id = Id::next();
        let loc = self.location.unwrap_or_else(Location::caller);
        let span = tracing::trace_span!(
            "task",
            task.id = id.as_u64(),
            task.name = self.name,
            task.kind = self.kind,
            task.output = %type_name::<F::Output>(),
            loc.file = loc.file(),
            loc.line = loc.line(),
        );
        let (_task_ref, handle) = super::spawn_with(future, self.scheduler, id, span);
        Ok(handle)
    }
}
