// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The I/O reactor: a `mio`-backed readiness event loop that
//! turns OS readiness into task wake-ups through a table of
//! [`bridge::Bridge`]s, one per registered I/O source.

mod bridge;
pub mod ops;

pub(crate) use bridge::Bridge;

use crate::scheduler::Handle;
use mio::{Events, Interest, Token};
use slab::Slab;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Waker;

const WAKER_TOKEN: Token = Token(usize::MAX);

/// One registered I/O source's pending wakers, keyed by readiness direction.
/// This is the "waker-map" shape `Bridge` reads and writes into.
#[derive(Default)]
struct Readiness {
    read: Option<Waker>,
    write: Option<Waker>,
}

struct Sources {
    slab: Slab<Readiness>,
}

/// Owns the `mio::Poll` event loop and the table of registered sources.
/// One `Reactor` is created per [`crate::Runtime`] and driven by a
/// dedicated background thread.
pub(crate) struct Reactor {
    poll: Mutex<mio::Poll>,
    registry: mio::Registry,
    sources: Mutex<Sources>,
    waker: mio::Waker,
    stop: AtomicBool,
    events_capacity: usize,
    #[allow(dead_code)] // kept so CompletionBridge callbacks can reschedule woken tasks
    scheduler: Handle,
}

impl Reactor {
    pub(crate) fn new(scheduler: Handle, events_capacity: usize) -> io::Result<Self> {
        let poll = mio::Poll::new()?;
        let registry = poll.registry().try_clone()?;
        let waker = mio::Waker::new(&registry, WAKER_TOKEN)?;
        Ok(Self {
            poll: Mutex::new(poll),
            registry,
            sources: Mutex::new(Sources { slab: Slab::new() }),
            waker,
            stop: AtomicBool::new(false),
            events_capacity,
            scheduler,
        })
    }

    pub(crate) fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        let _ = self.waker.wake();
    }

    /// Registers a `mio` event source, returning the [`Bridge`] async I/O
    /// wrappers poll against.
    pub(crate) fn register(
        self: &Arc<Self>,
        source: &mut impl mio::event::Source,
        interest: Interest,
    ) -> io::Result<Bridge> {
        let token = {
            let mut sources = self.lock_sources();
            Token(sources.slab.insert(Readiness::default()))
        };
        if let Err(err) = self.registry.register(source, token, interest) {
            self.lock_sources().slab.remove(token.0);
            return Err(err);
        }
        Ok(Bridge::new(Arc::clone(self), token))
    }

    fn deregister(&self, source: &mut impl mio::event::Source, token: Token) {
        let _ = self.registry.deregister(source);
        self.lock_sources().slab.remove(token.0);
    }

    fn lock_sources(&self) -> std::sync::MutexGuard<'_, Sources> {
        self.sources.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stashes `waker` to be woken the next time `token` becomes ready for
    /// `interest`. Called after a non-blocking I/O attempt returns
    /// `WouldBlock`.
    fn register_waker(&self, token: Token, interest: Interest, waker: &Waker) {
        let mut sources = self.lock_sources();
        let Some(readiness) = sources.slab.get_mut(token.0) else {
            return;
        };
        if interest.is_readable() {
            readiness.read = Some(waker.clone());
        }
        if interest.is_writable() {
            readiness.write = Some(waker.clone());
        }
    }

    fn clear_interest(&self, token: Token, interest: Interest) {
        let mut sources = self.lock_sources();
        if let Some(readiness) = sources.slab.get_mut(token.0) {
            if interest.is_readable() {
                readiness.read = None;
            }
            if interest.is_writable() {
                readiness.write = None;
            }
        }
    }

    /// Runs the event loop until [`Reactor::stop`] is called. Meant to be
    /// driven on its own dedicated thread, spawned by
    /// [`crate::runtime::Runtime`].
    pub(crate) fn run(&self) {
        let mut events = Events::with_capacity(self.events_capacity);
        loop {
            let poll_result = {
                let mut poll = self.poll.lock().unwrap_or_else(|e| e.into_inner());
                poll.poll(&mut events, None)
            };
            if let Err(err) = poll_result {
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                tracing::warn!(error = %err, "reactor poll failed");
                continue;
            }

            for event in &events {
                if event.token() == WAKER_TOKEN {
                    continue;
                }
                let mut sources = self.lock_sources();
                let Some(readiness) = sources.slab.get_mut(event.token().0) else {
                    continue;
                };
                let wake_read = event.is_readable().then(|| readiness.read.take()).flatten();
                let wake_write = event.is_writable().then(|| readiness.write.take()).flatten();
                drop(sources);
                if let Some(waker) = wake_read {
                    waker.wake();
                }
                if let Some(waker) = wake_write {
                    waker.wake();
                }
            }

            if self.stop.load(Ordering::Acquire) {
                tracing::debug!("reactor stop signal received");
                break;
            }
        }
    }
}
