// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The hierarchical hashed timer wheel.
//!
//! Six levels of 64 slots each give a tick-granularity precision (1 ms) out
//! to a roughly two-year maximum sleep duration, same shape as the
//! production timer wheel this is adapted from, just with each slot backed
//! by a plain `Vec` instead of an intrusive pinned linked list.

mod entry;
mod wheel;

use crate::time::clock::{Clock, Ticks};
use std::sync::{Arc, Mutex};
use std::task::{Poll, Waker};
use wheel::Wheel;

pub(in crate::time) use entry::Entry;

const WHEELS: usize = 6;

#[derive(Copy, Clone, Debug)]
pub(in crate::time) struct Deadline {
    pub(in crate::time) ticks: Ticks,
    slot: usize,
    wheel: usize,
}

#[derive(Debug)]
pub(crate) struct Timer {
    clock: Clock,
    core: Mutex<Core>,
}

#[derive(Debug)]
struct Core {
    now: Ticks,
    wheels: [Wheel; WHEELS],
}

impl Timer {
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            clock,
            core: Mutex::new(Core::new()),
        }
    }

    pub(crate) fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Registers a new deadline, returning the shared [`Entry`] a [`super::Sleep`]
    /// polls against.
    pub(crate) fn register(&self, ticks: Ticks) -> Arc<Entry> {
        let entry = Arc::new(Entry::new(ticks));
        let mut core = self.lock();
        core.register(Arc::clone(&entry));
        entry
    }

    pub(crate) fn cancel(&self, entry: &Arc<Entry>) {
        if entry.is_registered() {
            let mut core = self.lock();
            core.cancel(entry);
        }
    }

    /// Advances the wheel to the current time, firing everything that has
    /// expired. Returns the number fired and the next pending deadline, if
    /// any, so the caller can compute how long it may safely park for.
    pub(crate) fn turn(&self) -> (usize, Option<std::time::Instant>) {
        let mut core = self.lock();
        self.turn_locked(&mut core)
    }

    /// Non-blocking variant used by a worker that doesn't want to contend
    /// on the timer lock if another worker already owns it this tick.
    pub(crate) fn try_turn(&self) -> Option<(usize, Option<std::time::Instant>)> {
        let mut core = self.core.try_lock().ok()?;
        Some(self.turn_locked(&mut core))
    }

    fn turn_locked(&self, core: &mut Core) -> (usize, Option<std::time::Instant>) {
        let mut now = self.clock.now_ticks();
        let mut expired_total = 0;
        loop {
            let (expired, next) = core.poll(now);
            expired_total += expired;
            if let Some(next) = next {
                now = self.clock.now_ticks();
                if now >= next.ticks {
                    continue;
                }
            }
            let deadline = next.map(|d| self.clock.ticks_to_instant(d.ticks));
            return (expired_total, deadline);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Core {
    fn new() -> Self {
        Self {
            now: Ticks(0),
            wheels: std::array::from_fn(Wheel::new),
        }
    }

    fn register(&mut self, entry: Arc<Entry>) {
        if entry.deadline <= self.now {
            entry.fire();
            return;
        }
        entry.set_registered(true);
        self.insert_at(entry.deadline, entry);
    }

    fn cancel(&mut self, entry: &Arc<Entry>) {
        let wheel = self.wheel_index(entry.deadline);
        self.wheels[wheel].remove(entry.deadline, entry);
        entry.cancel();
    }

    fn insert_at(&mut self, deadline: Ticks, entry: Arc<Entry>) {
        let wheel = self.wheel_index(deadline);
        self.wheels[wheel].insert(deadline, entry);
    }

    fn poll(&mut self, now: Ticks) -> (usize, Option<Deadline>) {
        let mut pending_reschedule = Vec::new();
        let mut expired = 0;
        let mut next_deadline = self.next_deadline();

        while let Some(deadline) = next_deadline {
            if deadline.ticks > now {
                break;
            }

            let entries = self.wheels[deadline.wheel].take_slot(deadline.slot);
            for entry in entries {
                if entry.deadline > now {
                    // Was on a higher-level wheel; needs to drop down a
                    // level instead of firing yet. Rescheduled after this
                    // loop so we don't reprocess it in the same pass.
                    pending_reschedule.push(entry);
                } else {
                    expired += 1;
                    entry.fire();
                }
            }

            self.now = deadline.ticks;
            next_deadline = self.next_deadline();
        }

        self.now = now;

        let any_rescheduled = !pending_reschedule.is_empty();
        for entry in pending_reschedule {
            let deadline = entry.deadline;
            self.insert_at(deadline, entry);
        }
        if any_rescheduled {
            next_deadline = self.next_deadline();
        }

        (expired, next_deadline)
    }

    fn next_deadline(&self) -> Option<Deadline> {
        self.wheels.iter().find_map(|wheel| wheel.next_deadline(self.now))
    }

    fn wheel_index(&self, ticks: Ticks) -> usize {
        wheel_index(self.now, ticks)
    }
}

fn wheel_index(now: Ticks, ticks: Ticks) -> usize {
    const WHEEL_MASK: u64 = (1 << Wheel::BITS) - 1;
    let max_sleep_ticks: u64 = 1u64.checked_shl((Wheel::BITS * WHEELS) as u32).map_or(u64::MAX, |v| v - 1);

    let mut wheel_indices = now.0 ^ ticks.0 | WHEEL_MASK;
    if wheel_indices >= max_sleep_ticks {
        wheel_indices = max_sleep_ticks - 1;
    }

    let zeros = wheel_indices.leading_zeros();
    let rest = u64::BITS - 1 - zeros;
    (rest as usize / Wheel::BITS).min(WHEELS - 1)
}

/// Used by [`super::sleep`]/[`super::timeout`] to register a pending sleep
/// through the standard `Future::poll` convention, without exposing `Entry`
/// outside the `time` module.
pub(in crate::time) fn poll_sleep(timer: &Timer, entry: &Arc<Entry>, waker: &Waker) -> Poll<()> {
    if entry.is_fired() {
        return Poll::Ready(());
    }
    entry.register_waker(waker);
    if !entry.is_registered() {
        let mut core = timer.lock();
        core.register(Arc::clone(entry));
    }
    if entry.is_fired() {
        return Poll::Ready(());
    }
    Poll::Pending
}
