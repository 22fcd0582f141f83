//! Cancelable deferred tasks.
//!
//! Completion timers and fade steps are the only deferred work in the engine.
//! A [`Scheduler`] runs a boxed task once after a delay unless its
//! [`TaskHandle`] was canceled first.
//!
//! - [`ThreadScheduler`]: one timer thread, deadlines kept in a min-heap,
//!   new tasks delivered over a `crossbeam-channel` queue
//! - [`ManualScheduler`]: virtual clock; due tasks run on the thread that
//!   calls `advance` (tests, offline hosts driving time themselves)
//!
//! Cancellation is cooperative. A task that is already running when `cancel`
//! is called still completes; callers that need a hard guarantee re-check
//! their own state (generation tokens, fade epochs) inside the task.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};

use crate::lock;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Cancellation token for one scheduled task.
#[derive(Clone, Debug, Default)]
pub struct TaskHandle {
    canceled: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn new() -> Self { Self::default() }

    #[inline] pub fn cancel(&self) { self.canceled.store(true, Ordering::SeqCst); }
    #[inline] pub fn is_canceled(&self) -> bool { self.canceled.load(Ordering::SeqCst) }
}

pub trait Scheduler: Send + Sync {
    /// Run `task` once after `delay` unless the returned handle is canceled.
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle;
}

// ---------------------------------- Heap entry -----------------------------------

struct Entry<T> {
    due: T,
    seq: u64,
    handle: TaskHandle,
    task: Task,
}

impl<T: Ord> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool { self.due == other.due && self.seq == other.seq }
}

impl<T: Ord> Eq for Entry<T> {}

impl<T: Ord> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> { Some(self.cmp(other)) }
}

// Reversed so `BinaryHeap` pops the earliest deadline; ties keep submission order.
impl<T: Ord> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.due.cmp(&self.due).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T> Entry<T> {
    fn run(self) {
        if self.handle.is_canceled() {
            return;
        }
        if catch_unwind(AssertUnwindSafe(self.task)).is_err() {
            log::error!("scheduled task panicked");
        }
    }
}

// -------------------------------- Thread scheduler -------------------------------

/// Timer thread scheduler. Dropping it discards tasks that have not run yet.
pub struct ThreadScheduler {
    tx: Option<Sender<Entry<Instant>>>,
    seq: AtomicU64,
    thread: Option<JoinHandle<()>>,
    thread_id: Option<ThreadId>,
}

impl Default for ThreadScheduler {
    fn default() -> Self { Self::new() }
}

impl ThreadScheduler {
    pub fn new() -> Self {
        let (tx, rx) = unbounded::<Entry<Instant>>();
        let spawned = std::thread::Builder::new()
            .name("synthfx-timer".into())
            .spawn(move || {
                let mut heap: BinaryHeap<Entry<Instant>> = BinaryHeap::new();
                loop {
                    let now = Instant::now();
                    while heap.peek().is_some_and(|e| e.due <= now) {
                        if let Some(entry) = heap.pop() {
                            entry.run();
                        }
                    }
                    let next = match heap.peek().map(|e| e.due) {
                        Some(due) => rx.recv_deadline(due),
                        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };
                    match next {
                        Ok(entry) => heap.push(entry),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::debug!("timer thread exiting with {} pending task(s)", heap.len());
            });

        match spawned {
            Ok(handle) => {
                let thread_id = Some(handle.thread().id());
                Self { tx: Some(tx), seq: AtomicU64::new(0), thread: Some(handle), thread_id }
            }
            Err(e) => {
                log::error!("could not spawn timer thread: {e}; deferred tasks are disabled");
                Self { tx: None, seq: AtomicU64::new(0), thread: None, thread_id: None }
            }
        }
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
        let handle = TaskHandle::new();
        let Some(due) = Instant::now().checked_add(delay) else {
            log::warn!("task delay {delay:?} is out of range; task dropped");
            handle.cancel();
            return handle;
        };
        let entry = Entry {
            due,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            handle: handle.clone(),
            task,
        };
        let sent = self.tx.as_ref().is_some_and(|tx| tx.send(entry).is_ok());
        if !sent {
            log::warn!("timer thread unavailable; task dropped");
            handle.cancel();
        }
        handle
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(thread) = self.thread.take() {
            // Dropped from inside a task: the loop exits on its own.
            if Some(std::thread::current().id()) != self.thread_id && thread.join().is_err() {
                log::warn!("timer thread panicked");
            }
        }
    }
}

// -------------------------------- Manual scheduler -------------------------------

struct ManualState {
    now: Duration,
    seq: u64,
    heap: BinaryHeap<Entry<Duration>>,
}

/// Deterministic scheduler driven by [`advance`](ManualScheduler::advance).
pub struct ManualScheduler {
    inner: Mutex<ManualState>,
}

impl Default for ManualScheduler {
    fn default() -> Self { Self::new() }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self { inner: Mutex::new(ManualState { now: Duration::ZERO, seq: 0, heap: BinaryHeap::new() }) }
    }

    /// Virtual time elapsed so far.
    pub fn now(&self) -> Duration { lock(&self.inner).now }

    /// Tasks not yet run and not canceled.
    pub fn pending(&self) -> usize {
        lock(&self.inner).heap.iter().filter(|e| !e.handle.is_canceled()).count()
    }

    /// Move the clock forward by `by`, running every task that falls due, in
    /// deadline order. Tasks may schedule more tasks; those run too if they
    /// fall inside the window. Returns the number of tasks executed.
    pub fn advance(&self, by: Duration) -> usize {
        let target = lock(&self.inner).now.saturating_add(by);
        let mut ran = 0;
        loop {
            let entry = {
                let mut st = lock(&self.inner);
                if !st.heap.peek().is_some_and(|e| e.due <= target) {
                    st.now = target;
                    break;
                }
                let Some(entry) = st.heap.pop() else { break };
                st.now = entry.due;
                entry
            };
            if !entry.handle.is_canceled() {
                ran += 1;
            }
            entry.run();
        }
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TaskHandle {
        let handle = TaskHandle::new();
        let mut st = lock(&self.inner);
        let Some(due) = st.now.checked_add(delay) else {
            log::warn!("task delay {delay:?} is out of range; task dropped");
            handle.cancel();
            return handle;
        };
        let entry = Entry { due, seq: st.seq, handle: handle.clone(), task };
        st.seq += 1;
        st.heap.push(entry);
        handle
    }
}

// ------------------------------------ Tests --------------------------------------
