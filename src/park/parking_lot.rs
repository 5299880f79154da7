// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use super::{Park, Parker, UnparkToken};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Tracks every currently-parked worker so another worker (or the reactor)
/// can wake one or all of them without needing to know which ones are idle.
pub(crate) struct ParkingLot<P> {
    num_parked: AtomicUsize,
    unpark_tokens: Mutex<Vec<UnparkToken<P>>>,
}

impl<P: Park> ParkingLot<P> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            num_parked: AtomicUsize::new(0),
            unpark_tokens: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    pub(crate) fn num_parked(&self) -> usize {
        self.num_parked.load(Ordering::Acquire)
    }

    pub(crate) fn park(&self, parker: Parker<P>) {
        self.transition_to_parked();
        self.tokens().push(parker.clone().into_unpark());
        parker.park();
        self.transition_from_parked();
    }

    pub(crate) fn park_until(&self, parker: Parker<P>, deadline: Instant) {
        self.transition_to_parked();
        self.tokens().push(parker.clone().into_unpark());
        parker.park_until(deadline);
        self.transition_from_parked();
    }

    /// Parks, but registers the unpark token *before* calling `recheck` one
    /// final time, and only actually blocks if `recheck` still finds
    /// nothing. Without this ordering, a scheduler pushing work and calling
    /// `unpark_one` between the caller's own last check and this token's
    /// registration would wake a lot that isn't listening yet, and the
    /// parking worker would block past the point it had a runnable task.
    /// Returns whether the caller actually blocked.
    pub(crate) fn park_unless(&self, parker: Parker<P>, mut recheck: impl FnMut() -> bool) -> bool {
        self.transition_to_parked();
        self.tokens().push(parker.clone().into_unpark());
        let blocked = if recheck() {
            false
        } else {
            parker.park();
            true
        };
        self.transition_from_parked();
        blocked
    }

    /// [`ParkingLot::park_unless`] with a deadline.
    pub(crate) fn park_until_unless(
        &self,
        parker: Parker<P>,
        deadline: Instant,
        mut recheck: impl FnMut() -> bool,
    ) -> bool {
        self.transition_to_parked();
        self.tokens().push(parker.clone().into_unpark());
        let blocked = if recheck() {
            false
        } else {
            parker.park_until(deadline);
            true
        };
        self.transition_from_parked();
        blocked
    }

    /// Wakes an arbitrary parked worker. Returns `false` if none were
    /// parked at the time of the call (a racing worker may still park just
    /// after this returns).
    pub(crate) fn unpark_one(&self) -> bool {
        if let Some(token) = self.tokens().pop() {
            token.unpark();
            true
        } else {
            false
        }
    }

    pub(crate) fn unpark_all(&self) -> usize {
        let mut tokens = self.tokens();
        let mut unparked = 0;
        while let Some(token) = tokens.pop() {
            token.unpark();
            unparked += 1;
        }
        unparked
    }

    fn tokens(&self) -> std::sync::MutexGuard<'_, Vec<UnparkToken<P>>> {
        self.unpark_tokens.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition_to_parked(&self) {
        self.num_parked.fetch_add(1, Ordering::Release);
    }

    fn transition_from_parked(&self) {
        self.num_parked.fetch_sub(1, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::park::StdPark;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize as TestCounter;

    #[test]
    fn parking_lot_basically_works() {
        static UNPARKED: TestCounter = TestCounter::new(0);

        let lot: Arc<ParkingLot<StdPark>> = Arc::new(ParkingLot::with_capacity(4));

        let joins: Vec<_> = (0..4)
            .map(|_| {
                let lot = Arc::clone(&lot);
                std::thread::spawn(move || {
                    lot.park(Parker::new(StdPark::for_current()));
                    UNPARKED.fetch_add(1, Ordering::Release);
                })
            })
            .collect();

        let mut unparked = 0;
        while unparked < 4 {
            if lot.unpark_one() {
                unparked += 1;
            } else {
                std::thread::yield_now();
            }
        }

        for join in joins {
            join.join().unwrap();
        }

        assert_eq!(UNPARKED.load(Ordering::Acquire), 4);
    }
}
