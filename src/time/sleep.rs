// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use super::timer::{poll_sleep, Entry};
use super::Timer;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

/// Completes once `duration` has elapsed.
///
/// Registration against the timer wheel is lazy: nothing is inserted until
/// the future is first polled, so a `Sleep` that is constructed but never
/// awaited costs nothing beyond the allocation of its [`Entry`].
pub struct Sleep {
    timer: Arc<Timer>,
    duration: Duration,
    entry: Option<Arc<Entry>>,
}

/// Constructs a [`Sleep`] that completes after `duration`, using the timer
/// wheel of whichever runtime the caller is currently executing on.
///
/// # Panics
/// Panics if called outside a Talon runtime.
pub fn sleep(duration: Duration) -> Sleep {
    Sleep {
        timer: crate::context::current_timer(),
        duration,
        entry: None,
    }
}

impl Sleep {
    fn entry(&mut self) -> Arc<Entry> {
        if self.entry.is_none() {
            let deadline = self.timer.clock().deadline_for(self.duration);
            self.entry = Some(Arc::new(Entry::new(deadline)));
        }
        Arc::clone(self.entry.as_ref().unwrap())
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        let entry = this.entry();
        poll_sleep(&this.timer, &entry, cx.waker())
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(entry) = &self.entry {
            self.timer.cancel(entry);
        }
    }
}
