// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Generic async adaptor over a `mio::event::Source`.
//!
//! This is the seam a caller builds a concrete protocol wrapper on top of —
//! sample TCP/UDP/TLS types are explicitly out of scope here, but whatever a
//! caller registers (a `mio::net::TcpStream`, a `mio::unix::pipe::Receiver`,
//! …) gets readiness-driven `poll_read_ready`/`poll_write_ready` for free.

use super::{Bridge, Reactor};
use mio::Interest;
use std::cell::RefCell;
use std::future::poll_fn;
use std::io;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Associates a `mio::event::Source` with the current runtime's reactor.
///
/// `AsyncIo::new` registers the source once, and
/// `poll_read_ready`/`poll_write_ready` hand back `Pending` (after stashing
/// the waker) whenever the source would block.
///
/// `io` lives behind a `RefCell` so `poll_read_ready`/`poll_write_ready` can
/// take `&self`: the reactor's `Bridge` is reached the same way from any
/// number of clones of a task's waker, and a `Future::poll` only ever gets
/// `Pin<&mut Self>` for the *wrapper*, not for the source underneath.
pub struct AsyncIo<S: mio::event::Source> {
    io: RefCell<S>,
    bridge: Bridge,
}

impl<S: mio::event::Source> AsyncIo<S> {
    /// Registers `io` with the calling thread's runtime reactor for
    /// `interest`.
    ///
    /// # Panics
    /// Panics if called outside a Talon runtime (see
    /// [`crate::context::current_reactor`]).
    pub fn new(mut io: S, interest: Interest) -> io::Result<Self> {
        let reactor: Arc<Reactor> = crate::context::current_reactor();
        let bridge = reactor.register(&mut io, interest)?;
        Ok(Self {
            io: RefCell::new(io),
            bridge,
        })
    }

    /// Runs `f` with exclusive access to the wrapped source.
    pub fn with<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        f(&mut *self.io.borrow_mut())
    }

    /// Runs `op` against the wrapped source; if it would block, registers
    /// `cx`'s waker for readability and returns `Pending`.
    pub fn poll_read_ready<T>(
        &self,
        cx: &mut Context<'_>,
        mut op: impl FnMut(&mut S) -> io::Result<T>,
    ) -> Poll<io::Result<T>> {
        self.bridge
            .poll_io(Interest::READABLE, cx, || op(&mut *self.io.borrow_mut()))
    }

    /// Runs `op` against the wrapped source; if it would block, registers
    /// `cx`'s waker for writability and returns `Pending`.
    pub fn poll_write_ready<T>(
        &self,
        cx: &mut Context<'_>,
        mut op: impl FnMut(&mut S) -> io::Result<T>,
    ) -> Poll<io::Result<T>> {
        self.bridge
            .poll_io(Interest::WRITABLE, cx, || op(&mut *self.io.borrow_mut()))
    }

    /// Waits until `op` succeeds without blocking, parking on the reactor
    /// between attempts.
    pub async fn read_ready<T>(
        &self,
        mut op: impl FnMut(&mut S) -> io::Result<T>,
    ) -> io::Result<T> {
        poll_fn(|cx| self.poll_read_ready(cx, &mut op)).await
    }

    /// Waits until `op` succeeds without blocking, parking on the reactor
    /// between attempts.
    pub async fn write_ready<T>(
        &self,
        mut op: impl FnMut(&mut S) -> io::Result<T>,
    ) -> io::Result<T> {
        poll_fn(|cx| self.poll_write_ready(cx, &mut op)).await
    }
}

impl<S: mio::event::Source> Drop for AsyncIo<S> {
    fn drop(&mut self) {
        self.bridge.deregister(self.io.get_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::time::Duration;

    #[test]
    fn registers_and_drives_a_unix_pipe_to_readiness() {
        crate::runtime::block_on(async {
            let (mut writer_raw, reader_raw) = mio::unix::pipe::new().unwrap();
            let reader = AsyncIo::new(reader_raw, Interest::READABLE).unwrap();

            writer_raw.write_all(b"hi").unwrap();

            let mut buf = [0u8; 2];
            let n = reader
                .read_ready(|source| source.read(&mut buf))
                .await
                .unwrap();
            assert_eq!(n, 2);
            assert_eq!(&buf, b"hi");
        });
    }

    #[test]
    fn times_out_waiting_on_a_pipe_with_nothing_written() {
        crate::runtime::block_on(async {
            let (_writer, reader_raw) = mio::unix::pipe::new().unwrap();
            let reader = AsyncIo::new(reader_raw, Interest::READABLE).unwrap();
            let mut buf = [0u8; 1];

            let result = crate::time::timeout(
                Duration::from_millis(50),
                reader.read_ready(|source| source.read(&mut buf)),
            )
            .await;
            assert!(result.is_err(), "expected the read to time out");
        });
    }
}
