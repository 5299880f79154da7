// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Timer facilities: [`sleep`] and [`timeout`], backed by a shared
//! hierarchical hashed timer wheel.

mod clock;
mod sleep;
mod timeout;
mod timer;

pub use sleep::{sleep, Sleep};
pub use timeout::{timeout, Elapsed, Timeout};

pub(crate) use clock::Clock;
pub(crate) use timer::Timer;
