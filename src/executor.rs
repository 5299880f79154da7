// Copyright 2026 Talon Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The worker loop and the shared executor state it drives (components E
//! through I: the local run queue, the injector, the worker loop, and the
//! scheduler shell tying them together).

use crate::context;
use crate::error::SpawnError;
use crate::park::{Parker, ParkingLot, StdPark};
use crate::reactor::Reactor;
use crate::scheduler::{Handle, Injector, LocalQueue, Stealer};
use crate::task::{JoinHandle, TaskBuilder, TaskRef};
use crate::time::{Clock, Timer};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::num::NonZeroUsize;
use std::pin::pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context as TaskContext, Poll};
use std::time::Instant;

/// Which queue a worker checks first on a given poll, when both its local
/// queue and the global injector might have work. See
/// [`crate::Builder::scheduling_strategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStrategy {
    /// Drain the local queue; consult the global injector only every
    /// [`crate::Builder::global_queue_interval`] polls, or once the local
    /// queue runs dry. The default: keeps cache-hot work on one worker
    /// without letting it starve globally-injected tasks indefinitely.
    LocalFirst,
    /// Always check the global injector before the local queue.
    GlobalFirst,
    /// Alternate between the two on every poll.
    RoundRobin,
}

impl Default for SchedulingStrategy {
    fn default() -> Self {
        Self::LocalFirst
    }
}

/// A point-in-time snapshot of per-runtime counters. Only populated when
/// [`crate::Builder::enable_metrics`] was set; otherwise
/// [`crate::Runtime::metrics`] returns `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    pub tasks_polled: u64,
    pub tasks_stolen: u64,
    pub parks: u64,
}

#[derive(Debug, Default)]
struct MetricsCounters {
    tasks_polled: AtomicU64,
    tasks_stolen: AtomicU64,
    parks: AtomicU64,
}

impl MetricsCounters {
    fn snapshot(&self) -> Metrics {
        Metrics {
            tasks_polled: self.tasks_polled.load(Ordering::Relaxed),
            tasks_stolen: self.tasks_stolen.load(Ordering::Relaxed),
            parks: self.parks.load(Ordering::Relaxed),
        }
    }
}

/// Every tunable exposed by [`crate::Builder`], resolved once at `build()`
/// time and shared read-only by every worker thread.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExecutorConfig {
    pub(crate) worker_threads: usize,
    pub(crate) queue_capacity: usize,
    pub(crate) enable_work_stealing: bool,
    pub(crate) enable_lifo_slot: bool,
    pub(crate) scheduling_strategy: SchedulingStrategy,
    pub(crate) steal_batch_size: usize,
    pub(crate) global_queue_interval: usize,
    pub(crate) steal_retry_count: usize,
    pub(crate) metrics_enabled: bool,
}

/// State shared by the executor handle and every worker thread it spawns.
struct Shared {
    stop: Arc<AtomicBool>,
    parking_lot: ParkingLot<StdPark>,
    injector: Arc<Injector>,
    num_stealing: AtomicUsize,
    timer: Arc<Timer>,
    config: ExecutorConfig,
    metrics: MetricsCounters,
    // Populated once, after every worker's `LocalQueue` exists, so a worker
    // looking to steal can see its siblings. A worker never needs its own
    // stealer, only everyone else's.
    stealers: OnceLock<Vec<Stealer>>,
    // Populated once by `Builder::build`, after the reactor is constructed
    // from this executor's own handle (the reactor needs a `Handle` to
    // reschedule woken tasks, so it can't exist before the executor does).
    reactor: OnceLock<Arc<Reactor>>,
    // Distinguishes worker ids minted by `spawn_one_off_worker` from the
    // pool's permanent `0..worker_threads` ids.
    one_off_workers: AtomicUsize,
}

/// A cooperative, multi-threaded, work-stealing task executor.
///
/// Cloning an `Executor` is cheap and shares the same workers, queues, and
/// timer; [`crate::Runtime`] hands out clones as the `S: Schedule` type
/// tasks reschedule themselves onto.
#[derive(Clone)]
pub(crate) struct Executor {
    shared: Arc<Shared>,
}

pub(crate) struct Worker {
    id: usize,
    executor: Executor,
    queue: LocalQueue,
    parker: Parker<StdPark>,
    rng: RefCell<fastrand::Rng>,
    is_stealing: Cell<bool>,
    poll_count: Cell<usize>,
}

const TICK_BUDGET: usize = 256;

impl Executor {
    pub(crate) fn new(config: ExecutorConfig, clock: Clock) -> Self {
        let shared = Arc::new(Shared {
            stop: Arc::new(AtomicBool::new(false)),
            parking_lot: ParkingLot::with_capacity(config.worker_threads),
            injector: Arc::new(Injector::new()),
            num_stealing: AtomicUsize::new(0),
            timer: Arc::new(Timer::new(clock)),
            config,
            metrics: MetricsCounters::default(),
            stealers: OnceLock::new(),
            reactor: OnceLock::new(),
            one_off_workers: AtomicUsize::new(1),
        });
        Self { shared }
    }

    pub(crate) fn timer(&self) -> &Arc<Timer> {
        &self.shared.timer
    }

    /// Wires the runtime's reactor into this executor. Called once by
    /// [`crate::runtime::Builder::build`]; every worker reads it back out via
    /// [`Executor::reactor`] when it enters its run loop.
    pub(crate) fn set_reactor(&self, reactor: Arc<Reactor>) {
        let _ = self.shared.reactor.set(reactor);
    }

    fn reactor(&self) -> Arc<Reactor> {
        Arc::clone(
            self.shared
                .reactor
                .get()
                .expect("Executor::set_reactor must run before any worker starts"),
        )
    }

    pub(crate) fn stop(&self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.parking_lot.unpark_all();
    }

    /// Spawns the worker threads and blocks the calling thread's timer
    /// context, returning handles the caller can join on shutdown.
    ///
    /// Worker 0 is reserved for the thread that calls
    /// [`Executor::block_on`]; `spawn_workers` starts the remaining
    /// `num_workers - 1` background threads.
    pub(crate) fn spawn_workers(&self) -> (Worker, Vec<std::thread::JoinHandle<()>>) {
        let config = self.shared.config;
        let queues: Vec<LocalQueue> = (0..config.worker_threads)
            .map(|_| LocalQueue::new(config.queue_capacity, config.enable_lifo_slot))
            .collect();
        let stealers: Vec<Stealer> = queues.iter().map(LocalQueue::stealer).collect();
        let _ = self.shared.stealers.set(stealers);

        let mut queues = queues.into_iter();
        let worker0_queue = queues.next().expect("at least one worker");

        let handles = queues
            .enumerate()
            .map(|(offset, queue)| {
                let id = offset + 1;
                let executor = self.clone();
                std::thread::Builder::new()
                    .name(format!("talon-worker-{id}"))
                    .spawn(move || {
                        let worker = Worker::new(executor, id, queue);
                        worker.run();
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();

        (Worker::new(self.clone(), 0, worker0_queue), handles)
    }

    /// Builds a throwaway worker that shares the pool's injector, timer, and
    /// reactor but isn't wired into anyone's steal list. Used to drive a
    /// second top-level [`crate::Runtime::block_on`] call without tearing
    /// down and re-spawning the whole worker pool.
    pub(crate) fn spawn_one_off_worker(&self) -> Worker {
        let id = self.shared.config.worker_threads + self.shared.one_off_workers.fetch_add(1, Ordering::Relaxed);
        let queue = LocalQueue::new(self.shared.config.queue_capacity, self.shared.config.enable_lifo_slot);
        Worker::new(self.clone(), id, queue)
    }

    pub(crate) fn handle(&self) -> Handle {
        let injector = Arc::clone(&self.shared.injector);
        let stop = Arc::clone(&self.shared.stop);
        let shared = Arc::clone(&self.shared);
        Handle {
            injector,
            stop,
            unparker: Arc::new(move || {
                shared.parking_lot.unpark_one();
            }),
        }
    }

    /// Returns a snapshot of the executor's counters, or `None` if
    /// [`crate::Builder::enable_metrics`] was never set.
    pub(crate) fn metrics(&self) -> Option<Metrics> {
        self.shared.config.metrics_enabled.then(|| self.shared.metrics.snapshot())
    }

    #[track_caller]
    pub(crate) fn spawn<F>(&self, future: F) -> Result<JoinHandle<F::Output>, SpawnError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        TaskBuilder::new(self.handle()).spawn(future)
    }

    fn try_transition_to_stealing(&self, worker: &Worker) -> bool {
        debug_assert!(!worker.is_stealing.get());
        let num_stealing = self.shared.num_stealing.load(Ordering::Acquire);
        let num_parked = self.shared.parking_lot.num_parked();
        let num_workers = self.shared.config.worker_threads;
        if 2 * num_stealing >= num_workers.saturating_sub(num_parked) {
            return false;
        }
        worker.is_stealing.set(true);
        self.shared.num_stealing.fetch_add(1, Ordering::AcqRel);
        true
    }

    fn transition_from_stealing(&self, worker: &Worker) {
        debug_assert!(worker.is_stealing.get());
        worker.is_stealing.set(false);
        self.shared.num_stealing.fetch_sub(1, Ordering::AcqRel);
    }

    fn stealers(&self) -> &[Stealer] {
        self.shared.stealers.get().map_or(&[], Vec::as_slice)
    }
}

impl Worker {
    fn new(executor: Executor, id: usize, queue: LocalQueue) -> Self {
        Self {
            id,
            executor,
            queue,
            parker: Parker::new(StdPark::for_current()),
            rng: RefCell::new(fastrand::Rng::new()),
            is_stealing: Cell::new(false),
            poll_count: Cell::new(0),
        }
    }

    /// Runs this worker's main loop until the executor is stopped.
    pub(crate) fn run(&self) {
        let _span = tracing::debug_span!("worker", worker = self.id).entered();
        let injector = Arc::clone(&self.executor.shared.injector);
        let timer = Arc::clone(&self.executor.shared.timer);
        let handle = self.executor.handle();
        let reactor = self.executor.reactor();
        context::enter_worker(&self.queue, &injector, timer, handle, reactor, || loop {
            if self.tick() {
                continue;
            }
            if self.executor.shared.stop.load(Ordering::Acquire) {
                tracing::debug!(worker = self.id, "stop signal received");
                break;
            }
            let (expired, next_deadline) = self.executor.shared.timer.try_turn().unwrap_or((0, None));
            if expired > 0 {
                continue;
            }
            self.park_for(next_deadline);
        })
    }

    /// Drives `future` to completion on the calling thread, servicing the
    /// scheduler and timer between polls (the entry point
    /// [`crate::Runtime::block_on`] delegates to).
    #[track_caller]
    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        let _span = tracing::debug_span!("worker block_on", worker = self.id).entered();
        let injector = Arc::clone(&self.executor.shared.injector);
        let timer = Arc::clone(&self.executor.shared.timer);
        let handle = self.executor.handle();
        let reactor = self.executor.reactor();
        let waker = self.parker.clone().into_waker();
        let mut cx = TaskContext::from_waker(&waker);
        let mut future = pin!(future);

        context::enter_worker(&self.queue, &injector, timer, handle, reactor, || loop {
            if let Poll::Ready(v) = future.as_mut().poll(&mut cx) {
                return v;
            }
            if self.tick() {
                continue;
            }
            let (expired, next_deadline) = self.executor.shared.timer.try_turn().unwrap_or((0, None));
            if expired > 0 {
                continue;
            }
            self.park_for(next_deadline);
        })
    }

    /// Parks until unparked or `next_deadline` elapses, but registers the
    /// parking intent and re-checks for work (via `tick`) before actually
    /// blocking. Without that ordering, a task scheduled onto this worker's
    /// now-empty queue by another thread between `tick` returning `false`
    /// and this call could unpark a lot this worker hadn't joined yet, and
    /// the worker would then park with runnable work sitting unconsumed.
    fn park_for(&self, next_deadline: Option<Instant>) {
        let parking_lot = &self.executor.shared.parking_lot;
        let blocked = match next_deadline {
            Some(deadline) => parking_lot.park_until_unless(self.parker.clone(), deadline, || self.tick()),
            None => parking_lot.park_unless(self.parker.clone(), || self.tick()),
        };
        if blocked && self.executor.shared.config.metrics_enabled {
            self.executor.shared.metrics.parks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Picks the next task to run: every [`ExecutorConfig::global_queue_interval`]
    /// polls under [`SchedulingStrategy::LocalFirst`] (or every poll under
    /// `GlobalFirst`, alternating under `RoundRobin`) the global injector is
    /// consulted first, so a worker continuously fed from its own local
    /// queue can't starve tasks sitting in the injector indefinitely.
    fn next_task(&self) -> Option<TaskRef> {
        let config = &self.executor.shared.config;
        let count = self.poll_count.get();
        self.poll_count.set(count.wrapping_add(1));

        let check_global_first = match config.scheduling_strategy {
            SchedulingStrategy::GlobalFirst => true,
            SchedulingStrategy::LocalFirst => count % config.global_queue_interval == 0,
            SchedulingStrategy::RoundRobin => count % 2 == 0,
        };

        if check_global_first {
            if let Some(task) = self
                .executor
                .shared
                .injector
                .steal_into(&self.queue, config.steal_batch_size)
            {
                return Some(task);
            }
        }
        self.queue.pop()
    }

    /// Runs up to [`TICK_BUDGET`] ready tasks off the local queue, then
    /// tries to refill it by stealing. Returns `true` if the caller should
    /// immediately tick again rather than parking.
    fn tick(&self) -> bool {
        let mut polled = 0;
        while polled < TICK_BUDGET {
            let Some(task) = self.next_task() else { break };
            task.run();
            polled += 1;
        }
        tracing::trace!(worker = self.id, polled, "worker tick");
        if polled > 0 && self.executor.shared.config.metrics_enabled {
            self.executor.shared.metrics.tasks_polled.fetch_add(polled as u64, Ordering::Relaxed);
        }

        if polled > 0 && !self.queue.is_empty() {
            return true;
        }

        if self.executor.shared.config.enable_work_stealing && self.executor.try_transition_to_stealing(self) {
            let stolen = self.try_steal();
            self.executor.transition_from_stealing(self);
            if stolen.is_some() {
                if self.executor.shared.config.metrics_enabled {
                    self.executor.shared.metrics.tasks_stolen.fetch_add(1, Ordering::Relaxed);
                }
                return true;
            }
        }

        polled > 0
    }

    fn try_steal(&self) -> Option<NonZeroUsize> {
        let limit = self.executor.shared.config.steal_batch_size;
        if let Some(task) = self.executor.shared.injector.steal_into(&self.queue, limit) {
            self.queue.push_back(task, &self.executor.shared.injector);
            tracing::trace!(worker = self.id, "stole from injector");
            return NonZeroUsize::new(1);
        }

        let stealers = self.executor.stealers();
        let num_workers = stealers.len();
        if num_workers <= 1 {
            return None;
        }

        let backoff = crossbeam_utils::Backoff::new();
        for _ in 0..self.executor.shared.config.steal_retry_count {
            let start = self.rng.borrow_mut().usize(0..num_workers);
            if let Some(stolen) = self.steal_one_round(stealers, start, limit) {
                return Some(stolen);
            }
            backoff.spin();
        }

        if let Some(task) = self.executor.shared.injector.steal_into(&self.queue, limit) {
            self.queue.push_back(task, &self.executor.shared.injector);
            return NonZeroUsize::new(1);
        }

        None
    }

    fn steal_one_round(&self, stealers: &[Stealer], start: usize, limit: usize) -> Option<NonZeroUsize> {
        let num_workers = stealers.len();
        for i in 0..num_workers {
            let victim = (start + i) % num_workers;
            if victim == self.id {
                continue;
            }
            match stealers[victim].steal_half(&self.queue, limit) {
                crossbeam_deque::Steal::Success(task) => {
                    self.queue.push_back(task, &self.executor.shared.injector);
                    tracing::trace!(worker = self.id, victim, "stole from worker");
                    return NonZeroUsize::new(1);
                }
                crossbeam_deque::Steal::Retry | crossbeam_deque::Steal::Empty => continue,
            }
        }
        None
    }
}
