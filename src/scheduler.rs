//! One-shot, cancellable delayed execution.
//!
//! [`TimedScope`](crate::timed_scope::TimedScope) only needs one capability
//! from its environment: "run this callback after a delay unless I cancel it
//! first". That capability is the [`Scheduler`] trait. The crate ships
//! [`TimerScheduler`], a small thread pool shared by every timed scope:
//!
//! ```text
//!   schedule_once ──► ┌───────────────┐  due   ┌──────────────┐   ┌──────────┐
//!                     │ min-heap of   │ ─────► │ channel      │ ─►│ worker 0 │
//!   cancel ──► state  │ deadlines     │        │ (crossbeam)  │ ─►│ worker 1 │
//!                     └───────────────┘        └──────────────┘   └──────────┘
//!                       timer thread
//! ```
//!
//! Cancellation never blocks: it flips the alarm's state from pending to
//! cancelled and drops the callback. A worker flips it from pending to fired
//! right before running the callback, so exactly one of the two wins. The
//! emptied entries left in the heap are purged in batches whenever the heap
//! has doubled since the last purge.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt::{self, Debug};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, trace};

use crate::error::{Result, SchedulerError};

/// Callback run when an alarm fires.
pub type AlarmTask = Box<dyn FnOnce() + Send + 'static>;

/// Schedules one-shot alarms.
pub trait Scheduler: Debug + Send + Sync {
    /// Runs `task` after `delay` unless the returned handle is cancelled first.
    ///
    /// Implementations either keep `task` themselves, calling
    /// [`AlarmHandle::try_fire`] immediately before running it and skipping it
    /// if that returns `false`, or attach it with [`AlarmHandle::with_task`]
    /// and run it through [`AlarmHandle::fire`].
    fn schedule_once(&self, delay: Duration, task: AlarmTask) -> Result<AlarmHandle>;
}

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

struct AlarmState {
    state: AtomicU8,
    task: Mutex<Option<AlarmTask>>,
}

/// Shared state of one scheduled alarm.
#[derive(Clone)]
pub struct AlarmHandle {
    inner: Arc<AlarmState>,
}

impl AlarmHandle {
    /// Creates a pending alarm handle with no callback attached.
    pub fn new() -> Self {
        Self::from_task(None)
    }

    /// Creates a pending alarm handle owning `task`.
    ///
    /// The callback is dropped as soon as the alarm is cancelled.
    pub fn with_task(task: AlarmTask) -> Self {
        Self::from_task(Some(task))
    }

    fn from_task(task: Option<AlarmTask>) -> Self {
        Self {
            inner: Arc::new(AlarmState {
                state: AtomicU8::new(PENDING),
                task: Mutex::new(task),
            }),
        }
    }

    /// Cancels the alarm. Returns `true` if it had not fired yet.
    ///
    /// Once the alarm has fired this is a no-op returning `false`.
    pub fn cancel(&self) -> bool {
        let cancelled = self
            .inner
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if cancelled {
            self.discard_task();
        }
        cancelled
    }

    /// Claims the alarm for execution. Returns `false` if it was cancelled.
    pub fn try_fire(&self) -> bool {
        self.inner
            .state
            .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claims the alarm and runs the attached callback, if any.
    ///
    /// Returns `false` without running anything if the alarm was cancelled.
    pub fn fire(&self) -> bool {
        if !self.try_fire() {
            return false;
        }
        let task = self.inner.task.lock().take();
        if let Some(task) = task {
            task();
        }
        true
    }

    /// Returns `true` if the alarm neither fired nor was cancelled.
    pub fn is_pending(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == PENDING
    }

    /// Returns `true` if the alarm fired.
    pub fn has_fired(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == FIRED
    }

    /// Returns `true` if the alarm was cancelled before firing.
    pub fn is_cancelled(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == CANCELLED
    }

    // Dropped outside the lock: the callback may own arbitrary state.
    fn discard_task(&self) {
        let task = self.inner.task.lock().take();
        drop(task);
    }
}

impl Default for AlarmHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for AlarmHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.state.load(Ordering::Acquire) {
            PENDING => "pending",
            FIRED => "fired",
            _ => "cancelled",
        };
        write!(f, "AlarmHandle({state})")
    }
}

/// Configuration for [`TimerScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of threads running alarm callbacks (at least one).
    pub worker_threads: usize,
    /// Prefix of the scheduler's thread names.
    pub thread_name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            thread_name_prefix: "hedron-alarm".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of worker threads. Values below 1 are treated as 1.
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = count.max(1);
        self
    }

    /// Sets the thread name prefix.
    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }
}

struct Alarm {
    deadline: Instant,
    seq: u64,
    handle: AlarmHandle,
}

// Reversed so that BinaryHeap pops the earliest deadline first.
impl Ord for Alarm {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Alarm {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Alarm {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Alarm {}

/// Heap length below which cancelled alarms are never purged.
pub(crate) const MIN_PURGE_LEN: usize = 64;

struct AlarmQueue {
    heap: BinaryHeap<Alarm>,
    purge_at: usize,
}

impl AlarmQueue {
    fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            purge_at: MIN_PURGE_LEN,
        }
    }

    fn push(&mut self, alarm: Alarm) {
        if self.heap.len() >= self.purge_at {
            self.purge_cancelled();
        }
        self.heap.push(alarm);
    }

    fn purge_cancelled(&mut self) {
        let before = self.heap.len();
        self.heap.retain(|alarm| alarm.handle.is_pending());
        self.purge_at = (self.heap.len() * 2).max(MIN_PURGE_LEN);
        trace!(
            purged = before - self.heap.len(),
            remaining = self.heap.len(),
            "purged cancelled alarms"
        );
    }
}

struct Shared {
    queue: Mutex<AlarmQueue>,
    wakeup: Condvar,
    shutdown: AtomicBool,
    next_seq: AtomicU64,
}

/// A [`Scheduler`] backed by one timer thread and a bounded pool of workers.
///
/// Dropping the scheduler (or calling [`shutdown`](Self::shutdown)) stops the
/// threads; alarms that have not fired by then never fire.
///
/// # Examples
///
/// ```rust
/// use hedron_instrument::scheduler::{Scheduler, TimerScheduler};
/// use std::sync::mpsc;
/// use std::time::Duration;
///
/// let scheduler = TimerScheduler::new().unwrap();
/// let (tx, rx) = mpsc::channel();
///
/// let handle = scheduler
///     .schedule_once(Duration::from_millis(5), Box::new(move || tx.send(()).unwrap()))
///     .unwrap();
///
/// rx.recv_timeout(Duration::from_secs(5)).unwrap();
/// assert!(handle.has_fired());
/// assert!(!handle.cancel());
/// ```
pub struct TimerScheduler {
    shared: Arc<Shared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl TimerScheduler {
    /// Starts a scheduler with the default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(SchedulerConfig::default())
    }

    /// Starts a scheduler with `config`.
    pub fn with_config(config: SchedulerConfig) -> Result<Self> {
        let scheduler = Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(AlarmQueue::new()),
                wakeup: Condvar::new(),
                shutdown: AtomicBool::new(false),
                next_seq: AtomicU64::new(0),
            }),
            threads: Mutex::new(Vec::new()),
        };

        let (ready_tx, ready_rx) = crossbeam_channel::unbounded();

        let shared = Arc::clone(&scheduler.shared);
        let timer = thread::Builder::new()
            .name(format!("{}-timer", config.thread_name_prefix))
            .spawn(move || run_timer(&shared, ready_tx))?;
        scheduler.threads.lock().push(timer);

        for index in 0..config.worker_threads.max(1) {
            let ready_rx = ready_rx.clone();
            let worker = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name_prefix, index))
                .spawn(move || run_worker(ready_rx))?;
            scheduler.threads.lock().push(worker);
        }

        debug!(
            workers = config.worker_threads.max(1),
            prefix = %config.thread_name_prefix,
            "alarm scheduler started"
        );
        Ok(scheduler)
    }

    /// Returns the number of queued alarms.
    ///
    /// Cancelled alarms are purged in batches, so this may include some of
    /// them, never more than the live alarms plus a small constant.
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().heap.len()
    }

    /// Stops the scheduler and joins its threads.
    ///
    /// Alarms that have not fired are dropped. Calling this more than once is harmless.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        let unfired: Vec<Alarm> = {
            let mut queue = self.shared.queue.lock();
            let unfired = queue.heap.drain().collect();
            self.shared.wakeup.notify_all();
            unfired
        };
        if !unfired.is_empty() {
            debug!(dropped = unfired.len(), "discarding unfired alarms");
        }
        for alarm in unfired {
            alarm.handle.discard_task();
        }

        let current = thread::current().id();
        for handle in self.threads.lock().drain(..) {
            // An alarm callback may drop the last reference to its own scheduler.
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("alarm scheduler thread panicked");
            }
        }
        debug!("alarm scheduler stopped");
    }
}

impl Scheduler for TimerScheduler {
    fn schedule_once(&self, delay: Duration, task: AlarmTask) -> Result<AlarmHandle> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(SchedulerError::ShutDown);
        }

        let handle = AlarmHandle::with_task(task);
        let alarm = Alarm {
            deadline: Instant::now() + delay,
            seq: self.shared.next_seq.fetch_add(1, Ordering::Relaxed),
            handle: handle.clone(),
        };

        let mut queue = self.shared.queue.lock();
        // Re-checked under the lock so nothing is queued after shutdown cleared the heap.
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(SchedulerError::ShutDown);
        }
        queue.push(alarm);
        self.shared.wakeup.notify_one();
        Ok(handle)
    }
}

impl Drop for TimerScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Debug for TimerScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerScheduler")
            .field("pending", &self.pending())
            .field("shutdown", &self.shared.shutdown.load(Ordering::Acquire))
            .finish()
    }
}

fn run_timer(shared: &Shared, ready: Sender<AlarmHandle>) {
    let mut queue = shared.queue.lock();
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }
        match queue.heap.peek().map(|alarm| alarm.deadline) {
            None => shared.wakeup.wait(&mut queue),
            Some(deadline) if deadline > Instant::now() => {
                shared.wakeup.wait_until(&mut queue, deadline);
            }
            Some(_) => {
                let Some(Alarm { handle, .. }) = queue.heap.pop() else { continue };
                if handle.is_pending() && ready.send(handle).is_err() {
                    break;
                }
            }
        }
    }
    // Dropping `ready` here lets the workers drain and exit.
}

fn run_worker(ready: Receiver<AlarmHandle>) {
    for handle in ready.iter() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handle.fire())) {
            error!(
                panic = %panic_message(payload.as_ref()),
                "alarm callback panicked"
            );
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
