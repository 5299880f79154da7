// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The completion bridge: the per-registration handle that lets
//! a task's `poll` attempt a non-blocking I/O operation, and park on the
//! reactor's waker table when it would block.

use super::Reactor;
use mio::{Interest, Token};
use std::io;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Links one registered `mio` event source back to the [`Reactor`] that
/// owns it. Dropping a `Bridge` deregisters its source.
pub(crate) struct Bridge {
    reactor: Arc<Reactor>,
    token: Token,
}

impl Bridge {
    pub(super) fn new(reactor: Arc<Reactor>, token: Token) -> Self {
        Self { reactor, token }
    }

    /// Runs `op` (a non-blocking I/O attempt); if it returns `WouldBlock`,
    /// registers `cx`'s waker for `interest` and returns `Pending` instead
    /// of propagating the error, matching the standard "poll adapter over a
    /// blocking-style API" pattern.
    pub(crate) fn poll_io<T>(
        &self,
        interest: Interest,
        cx: &mut Context<'_>,
        mut op: impl FnMut() -> io::Result<T>,
    ) -> Poll<io::Result<T>> {
        match op() {
            Ok(value) => Poll::Ready(Ok(value)),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                self.reactor.register_waker(self.token, interest, cx.waker());
                Poll::Pending
            }
            Err(err) => Poll::Ready(Err(err)),
        }
    }

    pub(crate) fn deregister(&self, source: &mut impl mio::event::Source) {
        self.reactor.deregister(source, self.token);
    }
}
