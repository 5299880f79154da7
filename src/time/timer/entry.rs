// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::time::clock::Ticks;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::task::Waker;

/// One registration in the timer wheel, shared between a [`super::super::Sleep`]
/// future and whichever [`Wheel`][super::wheel::Wheel] slot currently holds it.
#[derive(Debug)]
pub(in crate::time) struct Entry {
    pub(in crate::time) deadline: Ticks,
    is_registered: AtomicBool,
    fired: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl Entry {
    pub(in crate::time) fn new(deadline: Ticks) -> Self {
        Self {
            deadline,
            is_registered: AtomicBool::new(false),
            fired: AtomicBool::new(false),
            waker: Mutex::new(None),
        }
    }

    pub(in crate::time) fn is_registered(&self) -> bool {
        self.is_registered.load(Ordering::Acquire)
    }

    pub(in crate::time) fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    pub(in crate::time) fn set_registered(&self, registered: bool) {
        self.is_registered.store(registered, Ordering::Release);
    }

    pub(in crate::time) fn register_waker(&self, waker: &Waker) {
        let mut slot = self.waker.lock().unwrap_or_else(|e| e.into_inner());
        match slot.as_mut() {
            Some(existing) if existing.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        }
    }

    /// Marks the entry as having fired and wakes whoever is waiting on it.
    pub(in crate::time) fn fire(&self) {
        self.set_registered(false);
        self.fired.store(true, Ordering::Release);
        if let Some(waker) = self.waker.lock().unwrap_or_else(|e| e.into_inner()).take() {
            waker.wake();
        }
    }

    /// Cancellation: marks cancelled without waking anyone. A dropped
    /// `Sleep` should not fire its waker.
    pub(in crate::time) fn cancel(&self) {
        self.set_registered(false);
    }
}
