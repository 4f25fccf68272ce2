//! Bounded worker pool and per-burst completion tracking.
//!
//! A burst is a batch of jobs submitted together. The submitter seals the
//! burst once every job is queued; completion latches exactly once, either in
//! the last worker to finish or in `seal` when the workers got there first.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::EngineError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// How a burst wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BurstOutcome {
    Completed,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Default)]
struct BurstState {
    pending: usize,
    sealed: bool,
    completed: bool,
    aborted: bool,
}

/// Countdown for one burst.
#[derive(Debug, Default)]
pub struct Burst {
    state: Mutex<BurstState>,
    done: Condvar,
}

impl Burst {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn add_task(&self) {
        self.state.lock().pending += 1;
    }

    /// Count one finished task. Returns true if this call completed the burst.
    pub fn task_done(&self) -> bool {
        let mut s = self.state.lock();
        s.pending = s.pending.saturating_sub(1);
        self.latch(&mut s)
    }

    /// Mark submission finished. Returns true if this call completed the burst.
    pub fn seal(&self) -> bool {
        let mut s = self.state.lock();
        s.sealed = true;
        self.latch(&mut s)
    }

    fn latch(&self, s: &mut BurstState) -> bool {
        if s.sealed && s.pending == 0 && !s.completed {
            s.completed = true;
            self.done.notify_all();
            true
        } else {
            false
        }
    }

    /// Wake the waiter without waiting for outstanding tasks.
    pub fn abort(&self) {
        self.state.lock().aborted = true;
        self.done.notify_all();
    }

    pub fn is_completed(&self) -> bool {
        self.state.lock().completed
    }

    /// Block until the burst completes, is aborted, or `timeout` elapses.
    /// `None`, or a timeout too large for an `Instant`, waits without a deadline.
    pub fn wait(&self, timeout: Option<Duration>) -> BurstOutcome {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut s = self.state.lock();
        loop {
            if s.completed {
                return BurstOutcome::Completed;
            }
            if s.aborted {
                return BurstOutcome::Cancelled;
            }
            match deadline {
                Some(deadline) => {
                    if self.done.wait_until(&mut s, deadline).timed_out() {
                        return if s.completed {
                            BurstOutcome::Completed
                        } else if s.aborted {
                            BurstOutcome::Cancelled
                        } else {
                            BurstOutcome::TimedOut
                        };
                    }
                }
                None => self.done.wait(&mut s),
            }
        }
    }
}

// Counts the task as done however the job ends: run, panicked or dropped
// from the queue unrun.
struct TaskGuard(Arc<Burst>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.task_done();
    }
}

#[derive(Debug, Default)]
struct CancelShared {
    cancelled: AtomicBool,
    active: Mutex<Option<Arc<Burst>>>,
}

/// Cancels the generation run in flight from any thread.
///
/// Queued tasks are dropped, running tasks finish but their burst wait wakes
/// immediately. Each run clears the flag when it starts.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    shared: Arc<CancelShared>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        if let Some(burst) = self.shared.active.lock().as_ref() {
            burst.abort();
        }
        tracing::warn!("generation cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn clear(&self) {
        self.shared.cancelled.store(false, Ordering::SeqCst);
    }

    fn attach(&self, burst: &Arc<Burst>) {
        *self.shared.active.lock() = Some(Arc::clone(burst));
        // A cancel racing with attach must still wake this burst.
        if self.is_cancelled() {
            burst.abort();
        }
    }

    fn detach(&self) {
        *self.shared.active.lock() = None;
    }
}

/// Fixed set of named worker threads fed from one job queue.
///
/// Threads are detached: dropping the pool closes the queue and flags
/// shutdown, and each worker exits once its current job returns.
pub struct WorkerPool {
    sender: Sender<Job>,
    shutdown: Arc<AtomicBool>,
    cancel: CancelHandle,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize, cancel: CancelHandle) -> Result<Self, EngineError> {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let shutdown = Arc::new(AtomicBool::new(false));

        for i in 0..size {
            let receiver = Arc::clone(&receiver);
            let shutdown = Arc::clone(&shutdown);
            let cancel = cancel.clone();
            thread::Builder::new()
                .name(format!("day-worker-{i}"))
                .spawn(move || Self::worker_loop(receiver, shutdown, cancel))
                .map_err(EngineError::WorkerSpawn)?;
        }

        tracing::debug!(workers = size, "worker pool started");
        Ok(Self {
            sender,
            shutdown,
            cancel,
            size,
        })
    }

    fn worker_loop(receiver: Arc<Mutex<Receiver<Job>>>, shutdown: Arc<AtomicBool>, cancel: CancelHandle) {
        loop {
            let job = {
                let receiver = receiver.lock();
                receiver.recv()
            };
            let Ok(job) = job else {
                break;
            };
            if shutdown.load(Ordering::SeqCst) || cancel.is_cancelled() {
                // Dropping the job still counts it down.
                drop(job);
                continue;
            }
            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                tracing::error!(thread = ?thread::current().name(), "worker task panicked");
            }
        }
        tracing::trace!(thread = ?thread::current().name(), "worker exiting");
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Stop running queued jobs. Jobs already running finish on their own.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Submit one burst and wait for it.
    pub fn run_burst<F>(&self, tasks: Vec<F>, timeout: Option<Duration>) -> BurstOutcome
    where
        F: FnOnce() + Send + 'static,
    {
        let burst = Burst::new();
        self.cancel.attach(&burst);

        let count = tasks.len();
        for task in tasks {
            burst.add_task();
            let guard = TaskGuard(Arc::clone(&burst));
            let job: Job = Box::new(move || {
                let _guard = guard;
                task();
            });
            // A closed queue hands the job back; dropping it counts it down.
            if let Err(mpsc::SendError(job)) = self.sender.send(job) {
                drop(job);
            }
        }

        if burst.seal() {
            tracing::trace!(tasks = count, "burst finished during submission");
        }

        let outcome = match burst.wait(timeout) {
            BurstOutcome::Completed if self.cancel.is_cancelled() => BurstOutcome::Cancelled,
            outcome => outcome,
        };
        self.cancel.detach();

        if outcome != BurstOutcome::Completed {
            self.shutdown();
        }
        tracing::debug!(tasks = count, ?outcome, "burst done");
        outcome
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_empty_burst_completes_on_seal() {
        let burst = Burst::new();
        assert!(burst.seal());
        assert!(!burst.seal());
        assert_eq!(burst.wait(Some(Duration::from_millis(10))), BurstOutcome::Completed);
    }

    #[test]
    fn test_burst_latches_once_under_contention() {
        for _ in 0..50 {
            let burst = Burst::new();
            let latched = Arc::new(AtomicUsize::new(0));
            for _ in 0..8 {
                burst.add_task();
            }
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let burst = Arc::clone(&burst);
                    let latched = Arc::clone(&latched);
                    thread::spawn(move || {
                        if burst.task_done() {
                            latched.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                })
                .collect();
            if burst.seal() {
                latched.fetch_add(1, Ordering::SeqCst);
            }
            for h in handles {
                h.join().unwrap();
            }
            assert_eq!(latched.load(Ordering::SeqCst), 1);
            assert!(burst.is_completed());
        }
    }

    #[test]
    fn test_unsealed_burst_does_not_complete() {
        let burst = Burst::new();
        burst.add_task();
        assert!(!burst.task_done());
        assert!(!burst.is_completed());
        assert_eq!(burst.wait(Some(Duration::from_millis(20))), BurstOutcome::TimedOut);
    }

    #[test]
    fn test_pool_runs_all_tasks() {
        let pool = WorkerPool::new(4, CancelHandle::new()).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let counter = Arc::clone(&counter);
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            })
            .collect();

        let outcome = pool.run_burst(tasks, Some(Duration::from_secs(10)));
        assert_eq!(outcome, BurstOutcome::Completed);
        assert_eq!(counter.load(Ordering::SeqCst), 32);
    }

    #[test]
    fn test_pool_survives_panicking_task() {
        let pool = WorkerPool::new(1, CancelHandle::new()).unwrap();
        let tasks: Vec<Box<dyn FnOnce() + Send>> = vec![Box::new(|| panic!("boom"))];
        assert_eq!(pool.run_burst(tasks, Some(Duration::from_secs(10))), BurstOutcome::Completed);
    }

    #[test]
    fn test_huge_timeout_waits_without_deadline() {
        let pool = WorkerPool::new(2, CancelHandle::new()).unwrap();
        let tasks = vec![|| thread::sleep(Duration::from_millis(20)); 4];
        assert_eq!(pool.run_burst(tasks, Some(Duration::MAX)), BurstOutcome::Completed);
        assert_eq!(
            pool.run_burst(Vec::<fn()>::new(), Some(Duration::from_secs(u64::MAX))),
            BurstOutcome::Completed
        );
    }

    #[test]
    fn test_timeout() {
        let pool = WorkerPool::new(1, CancelHandle::new()).unwrap();
        let tasks = vec![|| thread::sleep(Duration::from_millis(300))];
        assert_eq!(pool.run_burst(tasks, Some(Duration::from_millis(20))), BurstOutcome::TimedOut);
    }

    #[test]
    fn test_cancel_wakes_waiter_and_drops_queue() {
        let cancel = CancelHandle::new();
        let pool = WorkerPool::new(1, cancel.clone()).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let ran = Arc::clone(&ran);
                move || {
                    thread::sleep(Duration::from_millis(100));
                    ran.fetch_add(1, Ordering::SeqCst);
                }
            })
            .collect();

        let canceller = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                cancel.cancel();
            })
        };

        let started = Instant::now();
        let outcome = pool.run_burst(tasks, None);
        canceller.join().unwrap();

        assert_eq!(outcome, BurstOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_millis(400));
        thread::sleep(Duration::from_millis(250));
        assert!(ran.load(Ordering::SeqCst) <= 1);
    }
}
