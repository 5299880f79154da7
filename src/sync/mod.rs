// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Async synchronization primitives built over the poll contract:
//! [`Mutex`], [`Semaphore`], and a bounded [`channel`].

mod channel;
mod mutex;
mod semaphore;
mod wait_queue;

pub use channel::{channel, Receiver, SendError, Sender};
pub use mutex::{Mutex, MutexGuard};
pub use semaphore::{Semaphore, SemaphorePermit};
