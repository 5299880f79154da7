// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The runtime entry point: [`Builder`] configures and
//! [`Runtime`] owns a pool of workers, a shared [`Timer`], and the I/O
//! [`Reactor`] they poll between ticks.

use crate::error::{RuntimeError, SpawnError};
use crate::executor::{Executor, ExecutorConfig, Metrics, SchedulingStrategy};
use crate::reactor::Reactor;
use crate::task::JoinHandle;
use crate::time::Clock;
use std::future::Future;
use std::sync::Arc;
use std::thread::JoinHandle as ThreadHandle;

/// Which OS readiness mechanism the reactor should bind to. `mio` picks the
/// mechanism at compile time per target, so this is a declared expectation
/// [`Builder::build`] validates against the current platform rather than a
/// switch that actually changes what gets linked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoBackend {
    /// Accept whatever `mio` backs this platform with.
    Auto,
    Epoll,
    Kqueue,
    Iocp,
    /// Not backed by this runtime's `mio`-based reactor on any platform.
    IoUring,
}

impl Default for IoBackend {
    fn default() -> Self {
        Self::Auto
    }
}

impl IoBackend {
    fn validate(self) -> Result<(), RuntimeError> {
        let supported = match self {
            IoBackend::Auto => true,
            IoBackend::Epoll => cfg!(target_os = "linux") || cfg!(target_os = "android"),
            IoBackend::Kqueue => cfg!(any(
                target_os = "macos",
                target_os = "ios",
                target_os = "freebsd",
                target_os = "netbsd",
                target_os = "openbsd",
                target_os = "dragonfly",
            )),
            IoBackend::Iocp => cfg!(target_os = "windows"),
            IoBackend::IoUring => false,
        };
        if supported {
            Ok(())
        } else {
            Err(RuntimeError::UnsupportedIoBackend(self))
        }
    }
}

/// Builds a [`Runtime`] with a chosen worker count and tuning knobs.
///
/// Exposed as a conventional builder rather than a static-allocation macro,
/// since a hosted runtime can heap-allocate its worker pool instead of
/// requiring a `'static` array a `no_std` kernel would have to link in.
pub struct Builder {
    worker_threads: usize,
    queue_capacity: usize,
    enable_work_stealing: bool,
    enable_lifo_slot: bool,
    scheduling_strategy: SchedulingStrategy,
    steal_batch_size: usize,
    global_queue_interval: usize,
    steal_retry_count: usize,
    io_backend: IoBackend,
    reactor_events_capacity: usize,
    enable_metrics: bool,
}

impl Builder {
    const DEFAULT_QUEUE_CAPACITY: usize = 256;

    fn with_worker_threads(worker_threads: usize) -> Self {
        Self {
            worker_threads,
            queue_capacity: Self::DEFAULT_QUEUE_CAPACITY,
            enable_work_stealing: true,
            enable_lifo_slot: true,
            scheduling_strategy: SchedulingStrategy::LocalFirst,
            steal_batch_size: Self::DEFAULT_QUEUE_CAPACITY / 4,
            global_queue_interval: 61,
            steal_retry_count: 4,
            io_backend: IoBackend::Auto,
            reactor_events_capacity: 1024,
            enable_metrics: false,
        }
    }

    /// A worker per available core, matching `std::thread::available_parallelism`.
    pub fn new_multi_thread() -> Self {
        let worker_threads = std::thread::available_parallelism().map_or(1, |n| n.get());
        Self::with_worker_threads(worker_threads)
    }

    /// A single worker running on the thread that calls [`Runtime::block_on`].
    pub fn new_current_thread() -> Self {
        Self::with_worker_threads(1)
    }

    pub fn worker_threads(mut self, n: usize) -> Self {
        assert!(n > 0, "a runtime needs at least one worker thread");
        self.worker_threads = n;
        self
    }

    /// Bounds each worker's local run queue; tasks spawned past this spill
    /// to the global injector. Must be a power of two (the local queue is
    /// backed by a `crossbeam-deque` ring buffer).
    pub fn queue_capacity(mut self, n: usize) -> Self {
        assert!(n > 0 && n.is_power_of_two(), "queue_capacity must be a power of two");
        self.queue_capacity = n;
        self
    }

    /// Whether idle workers steal from the injector and their siblings.
    /// Disabling this turns the pool into `worker_threads` independent
    /// single-threaded executors sharing only the global injector.
    pub fn enable_work_stealing(mut self, enabled: bool) -> Self {
        self.enable_work_stealing = enabled;
        self
    }

    /// Whether a worker keeps a single-slot LIFO "hot slot" ahead of its
    /// deque. Disabling it trades producer/consumer cache locality for
    /// stricter FIFO-ish fairness between unrelated tasks.
    pub fn enable_lifo_slot(mut self, enabled: bool) -> Self {
        self.enable_lifo_slot = enabled;
        self
    }

    /// Which queue a worker consults first on a given poll. See
    /// [`SchedulingStrategy`].
    pub fn scheduling_strategy(mut self, strategy: SchedulingStrategy) -> Self {
        self.scheduling_strategy = strategy;
        self
    }

    /// Caps how many tasks a single steal (from the injector or a sibling)
    /// pulls at once.
    pub fn steal_batch_size(mut self, n: usize) -> Self {
        assert!(n > 0, "steal_batch_size must be greater than zero");
        self.steal_batch_size = n;
        self
    }

    /// Under [`SchedulingStrategy::LocalFirst`], how many local-queue polls
    /// elapse between forced checks of the global injector.
    pub fn global_queue_interval(mut self, n: usize) -> Self {
        assert!(n > 0, "global_queue_interval must be greater than zero");
        self.global_queue_interval = n;
        self
    }

    /// How many randomized steal rounds a worker attempts against its
    /// siblings before falling back to the injector and parking.
    pub fn steal_retry_count(mut self, n: usize) -> Self {
        assert!(n > 0, "steal_retry_count must be greater than zero");
        self.steal_retry_count = n;
        self
    }

    /// Declares which OS readiness mechanism the reactor is expected to use.
    /// [`Builder::build`] rejects a choice `mio` cannot back on the current
    /// platform rather than silently falling back to another one.
    pub fn io_backend(mut self, backend: IoBackend) -> Self {
        self.io_backend = backend;
        self
    }

    /// Capacity of the `mio::Events` buffer the reactor drains on each poll.
    pub fn reactor_events_capacity(mut self, n: usize) -> Self {
        assert!(n > 0, "reactor_events_capacity must be greater than zero");
        self.reactor_events_capacity = n;
        self
    }

    /// Whether workers track `tasks_polled`/`tasks_stolen`/`parks` counters,
    /// readable through [`Runtime::metrics`]. Off by default: the counters
    /// are atomics bumped on every poll, a cost idle runtimes shouldn't pay.
    pub fn enable_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    pub fn build(self) -> Result<Runtime, RuntimeError> {
        self.io_backend.validate()?;
        let config = ExecutorConfig {
            worker_threads: self.worker_threads,
            queue_capacity: self.queue_capacity,
            enable_work_stealing: self.enable_work_stealing,
            enable_lifo_slot: self.enable_lifo_slot,
            scheduling_strategy: self.scheduling_strategy,
            steal_batch_size: self.steal_batch_size,
            global_queue_interval: self.global_queue_interval,
            steal_retry_count: self.steal_retry_count,
            metrics_enabled: self.enable_metrics,
        };
        let executor = Executor::new(config, Clock::new());
        let reactor = Arc::new(
            Reactor::new(executor.handle(), self.reactor_events_capacity).map_err(RuntimeError::ReactorInit)?,
        );
        executor.set_reactor(Arc::clone(&reactor));
        Ok(Runtime {
            executor,
            reactor,
            reactor_thread: None,
            worker_threads: Vec::new(),
        })
    }
}

/// An owned, running instance of the task executor, reactor, and timer.
///
/// Dropping a `Runtime` signals every worker to stop and joins their
/// threads; outstanding tasks are simply leaked the way dropping a
/// `std::thread::JoinHandle` leaks its thread. Cancelling arbitrary
/// in-flight futures on drop is not attempted.
pub struct Runtime {
    executor: Executor,
    reactor: Arc<Reactor>,
    reactor_thread: Option<ThreadHandle<()>>,
    worker_threads: Vec<ThreadHandle<()>>,
}

impl Runtime {
    /// Builds a multi-threaded runtime with one worker per available core.
    pub fn new() -> Result<Self, RuntimeError> {
        Builder::new_multi_thread().build()
    }

    /// Spawns `future` onto this runtime, returning a
    /// [`JoinHandle`] immediately. Can be called from any thread, including
    /// from inside another task running on this runtime. Fails once
    /// [`Runtime::shutdown`] has been called.
    #[track_caller]
    pub fn spawn<F>(&self, future: F) -> Result<JoinHandle<F::Output>, SpawnError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.executor.spawn(future)
    }

    /// Returns a snapshot of this runtime's counters, or `None` if
    /// [`Builder::enable_metrics`] was never set.
    pub fn metrics(&self) -> Option<Metrics> {
        self.executor.metrics()
    }

    /// Signals every worker and the reactor to stop and joins their threads.
    /// Idempotent; also run by `Drop`, so calling this explicitly is only
    /// needed to observe shutdown complete before the `Runtime` itself is
    /// dropped.
    pub fn shutdown(&mut self) {
        self.executor.stop();
        self.reactor.stop();
        for handle in self.worker_threads.drain(..) {
            let _ = handle.join();
        }
        if let Some(handle) = self.reactor_thread.take() {
            let _ = handle.join();
        }
    }

    /// Runs `future` to completion on the calling thread, starting the
    /// remaining worker threads and the reactor thread on first call.
    #[track_caller]
    pub fn block_on<F: Future>(&mut self, future: F) -> F::Output {
        if self.worker_threads.is_empty() {
            let (worker0, handles) = self.executor.spawn_workers();
            self.worker_threads = handles;
            self.reactor_thread.get_or_insert_with(|| {
                let reactor = Arc::clone(&self.reactor);
                std::thread::Builder::new()
                    .name("talon-reactor".into())
                    .spawn(move || reactor.run())
                    .expect("failed to spawn reactor thread")
            });
            return worker0.block_on(future);
        }

        // The pool and reactor thread are already running: drive this call
        // with a throwaway worker that shares their injector, timer, and
        // reactor instead of tearing down and re-spawning everything.
        self.executor.spawn_one_off_worker().block_on(future)
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Convenience entry point equivalent to `Runtime::new()?.block_on(future)`.
pub fn block_on<F: Future>(future: F) -> F::Output {
    let mut rt = Runtime::new().expect("failed to start runtime");
    rt.block_on(future)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn spawn_and_join_many() {
        let mut rt = Builder::new_multi_thread().worker_threads(4).build().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        rt.block_on(async {
            let handles: Vec<_> = (0..100)
                .map(|_| {
                    let counter = Arc::clone(&counter);
                    crate::task::spawn(async move {
                        counter.fetch_add(1, Ordering::Relaxed);
                    })
                    .unwrap()
                })
                .collect();
            for handle in handles {
                handle.await.unwrap();
            }
        });
        assert_eq!(counter.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn block_on_runs_single_future() {
        let mut rt = Builder::new_current_thread().build().unwrap();
        let value = rt.block_on(async { 1 + 1 });
        assert_eq!(value, 2);
    }

    #[test]
    fn a_runtime_can_drive_multiple_sequential_block_on_calls() {
        let mut rt = Builder::new_multi_thread().worker_threads(4).build().unwrap();
        let first = rt.block_on(async { 1 + 1 });
        let second = rt.block_on(async {
            let handle = crate::task::spawn(async { 2 + 2 }).unwrap();
            handle.await.unwrap()
        });
        assert_eq!(first, 2);
        assert_eq!(second, 4);
    }

    #[test]
    fn sleep_waits_roughly_the_requested_duration() {
        let mut rt = Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let start = std::time::Instant::now();
            crate::time::sleep(Duration::from_millis(50)).await;
            let elapsed = start.elapsed();
            assert!(elapsed >= Duration::from_millis(50));
            assert!(elapsed < Duration::from_millis(500));
        });
    }
}
