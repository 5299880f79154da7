// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use super::Park;
use std::sync::Arc;
use std::task::{RawWaker, RawWakerVTable, Waker};
use std::time::Instant;

/// A cloneable wrapper around some [`Park`] implementation.
///
/// `Parker` is what the owning worker holds; cloning it and calling
/// [`Parker::into_unpark`] produces the handle other threads use to wake it.
pub(crate) struct Parker<P>(Arc<P>);

impl<P> Clone for Parker<P> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

/// The other end of a [`Parker`]: lets any thread wake the parker's owner.
pub(crate) struct UnparkToken<P>(Arc<P>);

impl<P> Clone for UnparkToken<P> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<P: Park> Parker<P> {
    pub(crate) fn new(park_impl: P) -> Self {
        Self(Arc::new(park_impl))
    }

    pub(crate) fn park(&self) {
        self.0.park();
    }

    pub(crate) fn park_until(&self, deadline: Instant) {
        self.0.park_until(deadline);
    }

    pub(crate) fn into_unpark(self) -> UnparkToken<P> {
        UnparkToken(self.0)
    }
}

impl<P: Park + 'static> Parker<P> {
    /// Builds a [`Waker`] that unparks this worker when woken.
    ///
    /// Used as the driving waker for `block_on`: polling the root future
    /// again happens as soon as whichever worker is executing it wakes up,
    /// whether that's from an I/O readiness event or an explicit wake.
    pub(crate) fn into_waker(self) -> Waker {
        self.into_unpark().into_waker()
    }
}

impl<P: Park> UnparkToken<P> {
    pub(crate) fn unpark(&self) {
        self.0.unpark();
    }
}

impl<P: Park + 'static> UnparkToken<P> {
    pub(crate) fn into_waker(self) -> Waker {
        // `#[inline(never)]` keeps this call site from being merged with
        // others that happen to produce structurally identical raw wakers;
        // `Waker::will_wake`'s pointer-identity fast path relies on the
        // vtable address staying stable per monomorphization.
        #[inline(never)]
        fn into_raw_waker<P: Park + 'static>(token: UnparkToken<P>) -> RawWaker {
            let ptr = Arc::into_raw(token.0).cast::<()>();
            RawWaker::new(ptr, vtable::<P>())
        }

        fn vtable<P: Park + 'static>() -> &'static RawWakerVTable {
            &RawWakerVTable::new(clone::<P>, wake::<P>, wake_by_ref::<P>, drop::<P>)
        }

        unsafe fn clone<P: Park + 'static>(ptr: *const ()) -> RawWaker {
            // SAFETY: `ptr` always originates from `Arc::into_raw` on an
            // `Arc<P>` constructed above.
            let arc = unsafe { Arc::from_raw(ptr.cast::<P>()) };
            std::mem::forget(Arc::clone(&arc));
            let leaked = Arc::into_raw(arc).cast::<()>();
            RawWaker::new(leaked, vtable::<P>())
        }

        unsafe fn wake<P: Park + 'static>(ptr: *const ()) {
            // SAFETY: see `clone`.
            let arc = unsafe { Arc::from_raw(ptr.cast::<P>()) };
            arc.unpark();
        }

        unsafe fn wake_by_ref<P: Park + 'static>(ptr: *const ()) {
            // SAFETY: see `clone`; this does not consume the reference.
            let arc = unsafe { Arc::from_raw(ptr.cast::<P>()) };
            arc.unpark();
            std::mem::forget(arc);
        }

        unsafe fn drop<P: Park + 'static>(ptr: *const ()) {
            // SAFETY: see `clone`.
            unsafe { Arc::from_raw(ptr.cast::<P>()) };
        }

        let raw = into_raw_waker(self);
        // SAFETY: the vtable above implements the `RawWaker` contract over
        // an `Arc<P>` the same way `std::task::Wake`'s blanket impl does.
        unsafe { Waker::from_raw(raw) }
    }
}

#[allow(dead_code)]
fn assert_parker_bounds<P: Park + Send + Sync + 'static>() {
    fn is_send_sync<T: Send + Sync>() {}
    is_send_sync::<UnparkToken<P>>();
}
