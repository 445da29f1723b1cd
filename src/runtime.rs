//! Timer scheduling abstraction
//!
//! Every suspension point in the crate is a scheduled callback: periodic
//! location sampling, single-shot completion/timeout races and the engine
//! "ready" delay. Callbacks run one at a time, in due order, which gives the
//! components a main-thread-like execution model without worker threads of
//! their own.

use std::{
    cmp::Reverse,
    collections::BinaryHeap,
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;

use crate::prelude::Arc;

/// A unit of deferred work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Posts tasks to run after a delay
pub trait Scheduler: Send + Sync + 'static {
    /// Run `task` once `delay` has elapsed, unless the handle is cancelled first
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle;

    /// Wall-clock milliseconds since the Unix epoch, as seen by this scheduler
    fn now_ms(&self) -> u64;
}

/// Handle to a scheduled task
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    /// Wakes a tokio sleep task so a cancelled timer exits immediately
    #[cfg(feature = "tokio-runtime")]
    wake: Arc<::tokio::sync::Notify>,
}

impl TimerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the task; a no-op if it already ran
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        // notify_one stores a permit if the sleeper is not waiting yet
        #[cfg(feature = "tokio-runtime")]
        self.wake.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// True once the task ran
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Runs `task` unless cancelled, marking the handle finished
    pub fn run(&self, task: Task) {
        if self.is_cancelled() {
            return;
        }
        self.finished.store(true, Ordering::SeqCst);
        task();
    }
}

pub(crate) fn system_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(feature = "tokio-runtime")]
pub use tokio_impl::TokioScheduler;

#[cfg(feature = "tokio-runtime")]
mod tokio_impl {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use ::tokio::{runtime::Handle, sync::mpsc};

    use super::*;

    /// Tokio-backed scheduler.
    ///
    /// Each timer sleeps on its own task; due callbacks are funnelled through
    /// one queue drained by a single dispatcher, so callbacks never overlap.
    #[derive(Clone)]
    pub struct TokioScheduler {
        handle: Handle,
        queue: mpsc::UnboundedSender<(TimerHandle, Task)>,
    }

    impl TokioScheduler {
        /// Spawns the dispatcher on `handle`
        pub fn new(handle: Handle) -> Self {
            let (queue, mut rx) = mpsc::unbounded_channel::<(TimerHandle, Task)>();
            handle.spawn(async move {
                while let Some((timer, task)) = rx.recv().await {
                    // A panicking callback must not take the dispatcher with it
                    if catch_unwind(AssertUnwindSafe(|| timer.run(task))).is_err() {
                        log::error!("scheduled callback panicked; continuing");
                    }
                }
                log::debug!("scheduler dispatcher stopped");
            });
            Self { handle, queue }
        }

        /// Uses the runtime the caller is running on.
        ///
        /// Panics outside a tokio runtime, like `Handle::current`.
        pub fn current() -> Self {
            Self::new(Handle::current())
        }
    }

    impl Scheduler for TokioScheduler {
        fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
            let timer = TimerHandle::new();
            let queued = timer.clone();
            let queue = self.queue.clone();
            self.handle.spawn(async move {
                ::tokio::select! {
                    _ = ::tokio::time::sleep(delay) => {}
                    _ = queued.wake.notified() => return,
                }
                if queued.is_cancelled() {
                    return;
                }
                if queue.send((queued, task)).is_err() {
                    log::warn!("scheduler dispatcher is gone; dropping task");
                }
            });
            timer
        }

        fn now_ms(&self) -> u64 {
            system_now_ms()
        }
    }
}

struct ManualEntry {
    due_ms: u64,
    seq: u64,
    timer: TimerHandle,
    task: Task,
}

impl PartialEq for ManualEntry {
    fn eq(&self, other: &Self) -> bool {
        (self.due_ms, self.seq) == (other.due_ms, other.seq)
    }
}

impl Eq for ManualEntry {}

impl PartialOrd for ManualEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ManualEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.due_ms, self.seq).cmp(&(other.due_ms, other.seq))
    }
}

struct ManualState {
    now_ms: u64,
    next_seq: u64,
    queue: BinaryHeap<Reverse<ManualEntry>>,
}

/// Virtual-clock scheduler driven explicitly with [`ManualScheduler::advance`].
///
/// Nothing runs until the clock is advanced, which makes timer races
/// reproducible in tests and in hosts that own their own event loop.
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    /// Starts the virtual clock at `start_ms`
    pub fn new(start_ms: u64) -> Self {
        Self {
            state: Mutex::new(ManualState {
                now_ms: start_ms,
                next_seq: 0,
                queue: BinaryHeap::new(),
            }),
        }
    }

    pub fn shared(start_ms: u64) -> Arc<Self> {
        Arc::new(Self::new(start_ms))
    }

    /// Moves the clock forward, running every task that falls due on the way.
    ///
    /// Tasks scheduled by running tasks are picked up if they fall due before
    /// the target time.
    pub fn advance(&self, by: Duration) {
        let target = self.state.lock().now_ms + by.as_millis() as u64;
        loop {
            let entry = {
                let mut state = self.state.lock();
                let next_due = state.queue.peek().map(|Reverse(next)| next.due_ms);
                match next_due {
                    Some(due) if due <= target => {
                        state.now_ms = state.now_ms.max(due);
                        state.queue.pop().map(|Reverse(entry)| entry)
                    }
                    _ => None,
                }
            };
            match entry {
                // The lock is released before the task runs so it may schedule more
                Some(entry) => entry.timer.run(entry.task),
                None => break,
            }
        }
        let mut state = self.state.lock();
        state.now_ms = state.now_ms.max(target);
    }

    /// Runs everything that is due right now
    pub fn run_due(&self) {
        self.advance(Duration::ZERO);
    }

    /// Number of queued tasks that have not been cancelled
    pub fn pending(&self) -> usize {
        self.state
            .lock()
            .queue
            .iter()
            .filter(|Reverse(entry)| !entry.timer.is_cancelled())
            .count()
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new(system_now_ms())
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerHandle {
        let timer = TimerHandle::new();
        let mut state = self.state.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let due_ms = state.now_ms + delay.as_millis() as u64;
        state.queue.push(Reverse(ManualEntry {
            due_ms,
            seq,
            timer: timer.clone(),
            task,
        }));
        timer
    }

    fn now_ms(&self) -> u64 {
        self.state.lock().now_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_manual_scheduler_runs_in_due_order() {
        let scheduler = ManualScheduler::new(0);
        let log = Arc::new(Mutex::new(Vec::new()));
        for (delay, tag) in [(300, "c"), (100, "a"), (200, "b"), (100, "a2")] {
            let log = log.clone();
            scheduler.schedule(
                Duration::from_millis(delay),
                Box::new(move || log.lock().push(tag)),
            );
        }
        scheduler.advance(Duration::from_millis(250));
        assert_eq!(*log.lock(), vec!["a", "a2", "b"]);
        assert_eq!(scheduler.now_ms(), 250);
        scheduler.advance(Duration::from_millis(50));
        assert_eq!(*log.lock(), vec!["a", "a2", "b", "c"]);
    }

    #[test]
    fn test_cancelled_timer_never_runs() {
        let scheduler = ManualScheduler::new(0);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let handle = scheduler.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(scheduler.pending(), 1);
        handle.cancel();
        assert_eq!(scheduler.pending(), 0);
        scheduler.advance(Duration::from_millis(100));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!handle.is_finished());
    }

    #[test]
    fn test_tasks_can_reschedule() {
        let scheduler = Arc::new(ManualScheduler::new(0));
        let hits = Arc::new(AtomicUsize::new(0));

        fn tick(scheduler: Arc<ManualScheduler>, hits: Arc<AtomicUsize>) {
            let next = scheduler.clone();
            scheduler.schedule(
                Duration::from_millis(1_000),
                Box::new(move || {
                    hits.fetch_add(1, Ordering::SeqCst);
                    tick(next, hits);
                }),
            );
        }

        tick(scheduler.clone(), hits.clone());
        scheduler.advance(Duration::from_millis(3_500));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.pending(), 1);
    }

    #[cfg(feature = "tokio-runtime")]
    #[::tokio::test]
    async fn test_tokio_scheduler() {
        let scheduler = TokioScheduler::current();
        let (tx, rx) = ::tokio::sync::oneshot::channel();
        let handle = scheduler.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                let _ = tx.send(42);
            }),
        );
        assert_eq!(rx.await.unwrap(), 42);
        assert!(handle.is_finished());
    }

    #[cfg(feature = "tokio-runtime")]
    #[::tokio::test]
    async fn test_tokio_scheduler_cancel() {
        let scheduler = TokioScheduler::current();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let handle = scheduler.schedule(
            Duration::from_millis(20),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        handle.cancel();
        ::tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[cfg(feature = "tokio-runtime")]
    #[::tokio::test]
    async fn test_tokio_cancel_releases_sleeping_task() {
        let scheduler = TokioScheduler::current();
        let captured = Arc::new(());
        let held = captured.clone();
        let handle = scheduler.schedule(
            Duration::from_secs(3_600),
            Box::new(move || drop(held)),
        );
        ::tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(Arc::strong_count(&captured), 2);

        // The sleep task ends well before its hour-long deadline
        handle.cancel();
        ::tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(Arc::strong_count(&captured), 1);
        assert!(!handle.is_finished());
    }
}
