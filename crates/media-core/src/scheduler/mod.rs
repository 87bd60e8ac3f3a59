//! Deadline-driven media task scheduler
//!
//! One [`Scheduler`] drives the whole media graph of a server
//! instance. A timer loop fires every tick period and runs each
//! registered task exactly once, queue by queue in
//! [`TaskQueue::PRIORITY_ORDER`]. Tasks run outside the registry lock,
//! so registration and unregistration from other threads never wait on
//! a slow tick, and a task may unregister itself while running.
//!
//! The scheduler measures its own punctuality: per-tick execution time
//! feeds [`SchedulerMetrics`], and ticks that overrun the period count
//! as missed deadlines.

pub mod task;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use mediagw_rtp_core::{ClockSample, MediaClock};

use crate::{Error, Result};
use task::{MediaTask, TaskHandle, TaskQueue, QUEUE_COUNT};

/// Default tick period (one narrowband audio frame)
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(20);

/// Default media clock rate in Hz
pub const DEFAULT_CLOCK_RATE: u32 = 8000;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between ticks
    pub tick_period: Duration,

    /// Rate of the media clock handed to tasks
    pub clock_rate: u32,

    /// Maximum tasks per queue, unbounded if `None`
    pub queue_capacity: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period: DEFAULT_TICK_PERIOD,
            clock_rate: DEFAULT_CLOCK_RATE,
            queue_capacity: None,
        }
    }
}

/// One registered task.
///
/// `task` is `None` while the tick loop has the task checked out for
/// execution; an empty slot whose entry disappears before put-back
/// means the task was unregistered mid-run and is dropped.
struct Slot {
    name: Arc<str>,
    task: Option<Box<dyn MediaTask>>,
}

#[derive(Default)]
struct TaskTable {
    queues: [BTreeMap<u64, Slot>; QUEUE_COUNT],
    next_id: u64,
}

impl TaskTable {
    fn len(&self) -> usize {
        self.queues.iter().map(BTreeMap::len).sum()
    }
}

/// Punctuality counters for a scheduler.
///
/// Counters accumulate across stop/start cycles and only clear on an
/// explicit [`reset`](SchedulerMetrics::reset).
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    ticks: AtomicU64,
    missed_deadlines: AtomicU64,
    worst_nanos: AtomicU64,
}

impl SchedulerMetrics {
    fn record_tick(&self, elapsed: Duration, period: Duration) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.worst_nanos
            .fetch_max(elapsed.as_nanos() as u64, Ordering::Relaxed);
        if elapsed > period {
            self.missed_deadlines.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Ticks executed so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Ticks whose execution overran the tick period
    pub fn missed_ticks(&self) -> u64 {
        self.missed_deadlines.load(Ordering::Relaxed)
    }

    /// Longest single tick observed
    pub fn worst_case_execution_time(&self) -> Duration {
        Duration::from_nanos(self.worst_nanos.load(Ordering::Relaxed))
    }

    /// Fraction of ticks that overran, 0.0 when no ticks have run
    pub fn miss_rate(&self) -> f64 {
        let ticks = self.ticks();
        if ticks == 0 {
            return 0.0;
        }
        self.missed_ticks() as f64 / ticks as f64
    }

    /// Clear all counters
    pub fn reset(&self) {
        self.ticks.store(0, Ordering::Relaxed);
        self.missed_deadlines.store(0, Ordering::Relaxed);
        self.worst_nanos.store(0, Ordering::Relaxed);
    }
}

/// The periodic driver of the media graph.
///
/// Registration is available before and during operation. Stopping the
/// timer loop keeps registrations and metrics, so a stopped scheduler
/// can be restarted, or driven manually with
/// [`tick_once`](Scheduler::tick_once).
pub struct Scheduler {
    config: SchedulerConfig,
    clock: MediaClock,
    table: Arc<Mutex<TaskTable>>,
    metrics: Arc<SchedulerMetrics>,
    loop_handle: Option<JoinHandle<()>>,
    shutdown: Option<watch::Sender<bool>>,
}

impl Scheduler {
    /// Create a scheduler; the timer loop starts on [`start`](Scheduler::start)
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        let clock = MediaClock::new(config.clock_rate)?;
        Ok(Self {
            config,
            clock,
            table: Arc::new(Mutex::new(TaskTable::default())),
            metrics: Arc::new(SchedulerMetrics::default()),
            loop_handle: None,
            shutdown: None,
        })
    }

    /// The media clock tasks are driven with
    pub fn clock(&self) -> MediaClock {
        self.clock
    }

    /// Punctuality counters
    pub fn metrics(&self) -> Arc<SchedulerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Number of tasks currently registered across all queues
    pub fn task_count(&self) -> usize {
        self.table.lock().len()
    }

    /// Register a task in a queue.
    ///
    /// The task starts running on the next tick. Fails with
    /// [`Error::CapacityExceeded`] when the queue is at its configured
    /// capacity.
    pub fn register<T>(&self, queue: TaskQueue, task: T) -> Result<TaskHandle>
    where
        T: MediaTask + 'static,
    {
        let mut table = self.table.lock();
        if let Some(limit) = self.config.queue_capacity {
            if table.queues[queue.index()].len() >= limit {
                return Err(Error::CapacityExceeded { queue, limit });
            }
        }

        let id = table.next_id;
        table.next_id += 1;
        let name: Arc<str> = Arc::from(task.name());
        debug!(task = %name, ?queue, id, "Registered media task");
        table.queues[queue.index()].insert(
            id,
            Slot {
                name,
                task: Some(Box::new(task)),
            },
        );
        Ok(TaskHandle { queue, id })
    }

    /// Remove a task.
    ///
    /// Safe to call with a handle that was already removed. A task
    /// unregistered while mid-execution finishes its current tick and
    /// is dropped afterwards.
    pub fn unregister(&self, handle: TaskHandle) {
        let mut table = self.table.lock();
        if let Some(slot) = table.queues[handle.queue.index()].remove(&handle.id) {
            debug!(task = %slot.name, queue = ?handle.queue, "Unregistered media task");
        }
    }

    /// Start the timer loop. Does nothing if it is already running.
    pub fn start(&mut self) {
        if self.loop_handle.is_some() {
            return;
        }

        let (tx, mut rx) = watch::channel(false);
        let table = Arc::clone(&self.table);
        let metrics = Arc::clone(&self.metrics);
        let clock = self.clock;
        let period = self.config.tick_period;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            debug!(?period, "Scheduler loop started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_tick(&table, &metrics, clock.now(), period);
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Scheduler loop stopped");
        });

        self.loop_handle = Some(handle);
        self.shutdown = Some(tx);
    }

    /// Stop the timer loop, waiting for the in-progress tick to
    /// finish. Registrations and metrics are kept.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
        if let Some(handle) = self.loop_handle.take() {
            let _ = handle.await;
        }
    }

    /// Run one tick synchronously on the calling thread.
    ///
    /// For tests and externally clocked deployments; must not be mixed
    /// with a running timer loop.
    pub fn tick_once(&self) {
        run_tick(&self.table, &self.metrics, self.clock.now(), self.config.tick_period);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(true);
        }
    }
}

/// Run every registered task once, queue by queue in priority order.
///
/// The registry lock is held only for slot bookkeeping, never across a
/// `process` call. A task that returns an error is removed.
fn run_tick(
    table: &Mutex<TaskTable>,
    metrics: &SchedulerMetrics,
    now: ClockSample,
    period: Duration,
) {
    let started = Instant::now();

    for &queue in TaskQueue::PRIORITY_ORDER.iter() {
        let index = queue.index();
        let ids: Vec<u64> = table.lock().queues[index].keys().copied().collect();

        for id in ids {
            let checked_out = {
                let mut guard = table.lock();
                guard.queues[index]
                    .get_mut(&id)
                    .and_then(|slot| slot.task.take().map(|task| (task, Arc::clone(&slot.name))))
            };
            let (mut task, name) = match checked_out {
                Some(entry) => entry,
                None => continue,
            };

            let result = task.process(now);

            let mut guard = table.lock();
            match result {
                Ok(()) => {
                    // Put the task back unless it was unregistered
                    // while running
                    if let Some(slot) = guard.queues[index].get_mut(&id) {
                        slot.task = Some(task);
                    }
                }
                Err(e) => {
                    warn!(task = %name, ?queue, "Media task failed, removing: {}", e);
                    guard.queues[index].remove(&id);
                }
            }
        }
    }

    metrics.record_tick(started.elapsed(), period);
}
