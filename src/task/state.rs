// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The task state machine.
//!
//! A refcount could be packed alongside these flags into one word, but the
//! `Arc` surrounding every [`super::Task`] already carries the refcount, so
//! the flags alone fit comfortably in a `u8`. The `POLLING` bit still
//! functions as a lock on the future slot: only the thread that set it may
//! touch the stage field underneath.

use bitflags::bitflags;
use std::sync::atomic::{AtomicU8, Ordering};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct Flags: u8 {
        /// The task is currently being polled by some worker. Acts as a lock
        /// on the future slot: only the thread that set this bit may touch it.
        const POLLING   = 0b0000_0001;
        /// The future returned `Poll::Ready`; terminal.
        const COMPLETE  = 0b0000_0010;
        /// A wake occurred while `POLLING` was set; the task must be
        /// rescheduled as soon as the in-flight poll returns.
        const WOKEN     = 0b0000_0100;
        /// The task was cancelled (dropped by its owner, or explicit
        /// `TaskRef::cancel`).
        const CANCELLED = 0b0000_1000;
        /// A `JoinHandle` for this task is still alive.
        const HAS_JOIN  = 0b0001_0000;
    }
}

/// What the scheduler should do after a `start_poll` attempt.
#[must_use]
pub(crate) enum StartPoll {
    /// Go ahead and poll the future.
    Poll,
    /// Another worker is already polling this task (spurious wake race);
    /// do nothing, the in-flight poll will observe `WOKEN` and reschedule.
    Busy,
    /// The task is already complete; drop the reference.
    AlreadyComplete,
}

/// What the scheduler should do after a poll returns.
#[must_use]
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum EndPoll {
    /// The future is still pending and was not woken during the poll; the
    /// `TaskRef` may be dropped, whoever holds the stored `Waker` owns
    /// rescheduling it.
    Pending,
    /// The future is still pending but was woken *during* its own poll
    /// (e.g. it woke its own waker, or a LIFO-slot neighbor woke it); the
    /// caller must reschedule it immediately.
    PendingScheduleSelf,
    /// The future completed.
    Ready,
}

/// Packed atomic task state.
#[derive(Debug)]
pub(crate) struct State(AtomicU8);

impl State {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(Flags::empty().bits()))
    }

    fn load(&self, order: Ordering) -> Flags {
        Flags::from_bits_truncate(self.0.load(order))
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.load(Ordering::Acquire).contains(Flags::COMPLETE)
    }

    pub(crate) fn set_has_join_handle(&self, has: bool) {
        if has {
            self.0.fetch_or(Flags::HAS_JOIN.bits(), Ordering::AcqRel);
        } else {
            self.0
                .fetch_and(!Flags::HAS_JOIN.bits(), Ordering::AcqRel);
        }
    }

    pub(crate) fn has_join_handle(&self) -> bool {
        self.load(Ordering::Acquire).contains(Flags::HAS_JOIN)
    }

    /// `idle -> scheduled/running` transition attempted by the worker right
    /// before it calls `Future::poll`.
    pub(crate) fn start_poll(&self) -> StartPoll {
        let mut result = StartPoll::Poll;
        let _ = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            let mut flags = Flags::from_bits_truncate(bits);
            if flags.contains(Flags::COMPLETE) {
                result = StartPoll::AlreadyComplete;
                return None;
            }
            if flags.contains(Flags::POLLING) {
                result = StartPoll::Busy;
                return None;
            }
            flags.insert(Flags::POLLING);
            flags.remove(Flags::WOKEN);
            Some(flags.bits())
        });
        result
    }

    /// `running -> idle` or `running -> completed` transition, performed by
    /// the worker once `Future::poll` returns.
    pub(crate) fn end_poll(&self, ready: bool) -> EndPoll {
        let mut result = EndPoll::Pending;
        let _ = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            let mut flags = Flags::from_bits_truncate(bits);
            flags.remove(Flags::POLLING);
            if ready {
                flags.insert(Flags::COMPLETE);
                result = EndPoll::Ready;
            } else if flags.contains(Flags::WOKEN) {
                flags.remove(Flags::WOKEN);
                result = EndPoll::PendingScheduleSelf;
            } else {
                result = EndPoll::Pending;
            }
            Some(flags.bits())
        });
        result
    }

    /// Waker::wake idempotence: returns `true`
    /// exactly once per idle->scheduled cycle.
    pub(crate) fn mark_woken(&self) -> bool {
        let mut should_enqueue = false;
        let _ = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            let mut flags = Flags::from_bits_truncate(bits);
            if flags.contains(Flags::COMPLETE) {
                should_enqueue = false;
                return None;
            }
            if flags.contains(Flags::POLLING) {
                // The task is mid-poll; mark WOKEN so `end_poll` reschedules
                // it instead of losing the wakeup. No enqueue happens now.
                if flags.contains(Flags::WOKEN) {
                    return None;
                }
                flags.insert(Flags::WOKEN);
                should_enqueue = false;
                return Some(flags.bits());
            }
            // Idle task: this caller wins the race to enqueue it.
            should_enqueue = true;
            Some(flags.bits())
        });
        should_enqueue
    }

    pub(crate) fn cancel(&self) -> bool {
        let mut did_cancel = false;
        let _ = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            let mut flags = Flags::from_bits_truncate(bits);
            if flags.contains(Flags::COMPLETE) || flags.contains(Flags::CANCELLED) {
                return None;
            }
            flags.insert(Flags::CANCELLED);
            did_cancel = true;
            Some(flags.bits())
        });
        did_cancel
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire).contains(Flags::CANCELLED)
    }
}
