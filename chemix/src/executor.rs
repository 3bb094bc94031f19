//! Worker-thread pools running reaction bodies and scheduling passes.
//!
//! The engine is pool-agnostic: a site only needs `submit`, `shutdown` and
//! `is_inactive`. This module provides the stock implementation, a fixed set
//! of parked worker threads draining a shared injector queue.

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use parking::{Parker, Unparker};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size pool of worker threads.
///
/// `ThreadPool` is a cheap clonable handle; all clones drive the same workers.
/// Tasks are executed in no particular order and with no thread affinity.
/// After [`shutdown`](ThreadPool::shutdown) the pool refuses further
/// submissions; queued tasks that have not started are dropped, while tasks
/// already running are left to finish.
#[derive(Clone)]
pub struct ThreadPool {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    pool_size: usize,
    /// Injector queue; also the lock that workers re-check before parking.
    queue: Mutex<VecDeque<Task>>,
    /// Bit field of all workers that are currently unparked.
    active_workers: AtomicUsize,
    unparkers: Vec<Unparker>,
    shutdown: AtomicBool,
    /// Count of workers that have not terminated yet.
    live_workers: Mutex<usize>,
    terminated: Condvar,
}

impl ThreadPool {
    /// Creates a pool with one worker per logical CPU.
    pub fn with_default_size(name: &str) -> Self {
        Self::new(name, num_cpus::get())
    }

    /// Creates a pool with the specified number of workers.
    ///
    /// Worker threads are named `"<name>-<index>"`.
    ///
    /// # Panics
    ///
    /// This will panic if the specified pool size is zero or is more than
    /// `usize::BITS`.
    pub fn new(name: &str, pool_size: usize) -> Self {
        assert!(pool_size >= 1, "the pool size should be at least one");
        assert!(
            pool_size <= usize::BITS as usize,
            "the pool size should be at most {}",
            usize::BITS
        );

        let (parkers, unparkers): (Vec<_>, Vec<_>) =
            (0..pool_size).map(|_| parking::pair()).unzip();

        let inner = Arc::new(Inner {
            name: name.to_string(),
            pool_size,
            queue: Mutex::new(VecDeque::new()),
            // All workers start unparked and drain the (empty) queue once.
            active_workers: AtomicUsize::new(usize::MAX >> (usize::BITS as usize - pool_size)),
            unparkers,
            shutdown: AtomicBool::new(false),
            live_workers: Mutex::new(pool_size),
            terminated: Condvar::new(),
        });

        for (id, parker) in parkers.into_iter().enumerate() {
            let inner = inner.clone();
            thread::Builder::new()
                .name(format!("{}-{}", name, id))
                .spawn(move || inner.run_worker(id, parker))
                .expect("failed to spawn a pool worker thread");
        }

        Self { inner }
    }

    /// Returns the pool name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Submits a task for asynchronous execution.
    pub fn submit(
        &self,
        task: impl FnOnce() + Send + 'static,
    ) -> Result<(), ShutdownError> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(ShutdownError {});
        }
        self.inner.queue.lock().unwrap().push_back(Box::new(task));
        self.inner.activate_worker();

        Ok(())
    }

    /// Shuts the pool down, waiting at most `grace` for workers to terminate.
    ///
    /// Further submissions are refused immediately. Returns `true` if all
    /// workers terminated within the grace period.
    pub fn shutdown(&self, grace: Duration) -> bool {
        self.inner.shutdown.store(true, Ordering::Release);
        // Queued tasks that never started are dropped, not run.
        self.inner.queue.lock().unwrap().clear();
        for unparker in &self.inner.unparkers {
            unparker.unpark();
        }

        let deadline = Instant::now() + grace;
        let mut live = self.inner.live_workers.lock().unwrap();
        while *live > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .inner
                .terminated
                .wait_timeout(live, deadline - now)
                .unwrap();
            live = guard;
        }

        true
    }

    /// Returns `true` once the pool is shut down and all workers terminated.
    pub fn is_inactive(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
            && *self.inner.live_workers.lock().unwrap() == 0
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("name", &self.inner.name)
            .field("pool_size", &self.inner.pool_size)
            .finish_non_exhaustive()
    }
}

impl Inner {
    /// Unparks an idle worker if any is found, or does nothing otherwise.
    ///
    /// Lost wakeups are prevented by the queue mutex: a worker only parks
    /// after re-checking the queue while holding it.
    fn activate_worker(&self) {
        let mut active_workers = self.active_workers.load(Ordering::Relaxed);
        loop {
            let first_idle_worker = active_workers.trailing_ones() as usize;
            if first_idle_worker >= self.pool_size {
                return;
            }
            active_workers = self
                .active_workers
                .fetch_or(1 << first_idle_worker, Ordering::AcqRel);
            if active_workers & (1 << first_idle_worker) == 0 {
                self.unparkers[first_idle_worker].unpark();
                return;
            }
        }
    }

    fn run_worker(&self, id: usize, parker: Parker) {
        loop {
            if self.shutdown.load(Ordering::Acquire) {
                break;
            }
            let task = self.queue.lock().unwrap().pop_front();
            match task {
                Some(task) => {
                    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                        tracing::error!(
                            pool = %self.name,
                            worker = id,
                            "a task panicked on a pool worker"
                        );
                    }
                }
                None => {
                    self.active_workers
                        .fetch_and(!(1 << id), Ordering::AcqRel);

                    // Re-check under the queue lock so that a task pushed
                    // after the failed pop cannot be stranded.
                    let park = {
                        let queue = self.queue.lock().unwrap();
                        queue.is_empty() && !self.shutdown.load(Ordering::Acquire)
                    };
                    if park {
                        parker.park();
                    } else {
                        self.active_workers.fetch_or(1 << id, Ordering::AcqRel);
                    }
                }
            }
        }

        let mut live = self.live_workers.lock().unwrap();
        *live -= 1;
        self.terminated.notify_all();
    }
}

/// Error returned when submitting a task to a pool that was shut down.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ShutdownError {}

impl fmt::Display for ShutdownError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "the pool is shut down and no longer accepts tasks")
    }
}

impl Error for ShutdownError {}
