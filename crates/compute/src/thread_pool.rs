//! # Worker Thread Pool
//!
//! A fixed set of spin-waiting worker threads used to run solver passes.
//!
//! The pool owner is worker 0. Extra workers are OS threads that sleep until
//! [`ThreadPool::begin`] wakes them, then spin on their task slot until
//! [`ThreadPool::end`] clears their running flag. Spinning burns CPU while a
//! bracket is open but keeps the wake latency of every pass close to zero,
//! which is what a fixed-rate simulation loop wants.
//!
//! Work inside a bracket is submitted with [`ThreadPool::parallel_execute`].
//! Every share of a job receives `(thread_index, thread_count)` and must write
//! only to its own pre-partitioned slots; shares run in any relative order.
//! `parallel_execute` returns after every share has completed, and `end`
//! returns after every worker has left its loop, so writes made in one pass
//! are visible to the next.
//!
//! `end` has no timeout. A task that never returns blocks it forever; the
//! pool only logs a warning once the wait exceeds the diagnostic threshold.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

/// Upper bound on the number of threads a pool will run, owner included.
pub const MAX_THREADS_COUNT: usize = 32;

type Job<'a> = dyn Fn(usize, usize) + Sync + 'a;

#[derive(Clone, Copy)]
struct TaskRef {
    job: *const Job<'static>,
    thread_count: usize,
}

// SAFETY: the pointee is `Sync` and outlives every use; see `parallel_execute`.
unsafe impl Send for TaskRef {}

struct WorkerState {
    thread_index: usize,
    begin: AtomicBool,
    still_looping: AtomicBool,
    has_task: AtomicBool,
    quit: AtomicBool,
    task: Mutex<Option<TaskRef>>,
    panic: Mutex<Option<Box<dyn Any + Send>>>,
}

impl WorkerState {
    fn new(thread_index: usize) -> Self {
        Self {
            thread_index,
            begin: AtomicBool::new(false),
            still_looping: AtomicBool::new(false),
            has_task: AtomicBool::new(false),
            quit: AtomicBool::new(false),
            task: Mutex::new(None),
            panic: Mutex::new(None),
        }
    }

    fn thread_function(&self) {
        loop {
            while !self.begin.load(Ordering::Acquire) {
                // A bracket can open and close before this thread wakes.
                self.still_looping.store(false, Ordering::Release);
                if self.quit.load(Ordering::Acquire) {
                    return;
                }
                thread::park();
            }

            while self.begin.load(Ordering::Acquire) {
                if self.has_task.load(Ordering::Acquire) {
                    let task = self.task.lock().take();
                    if let Some(task) = task {
                        // SAFETY: the owner blocks in `parallel_execute` until
                        // `has_task` is cleared below, so the job is alive.
                        let job = unsafe { &*task.job };
                        let result = panic::catch_unwind(AssertUnwindSafe(|| {
                            job(self.thread_index, task.thread_count);
                        }));
                        if let Err(payload) = result {
                            *self.panic.lock() = Some(payload);
                        }
                    }
                    self.has_task.store(false, Ordering::Release);
                }
                std::hint::spin_loop();
            }
            self.still_looping.store(false, Ordering::Release);
        }
    }
}

struct Worker {
    state: Arc<WorkerState>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(base_name: &str, thread_index: usize) -> std::io::Result<Self> {
        let state = Arc::new(WorkerState::new(thread_index));
        let thread_state = Arc::clone(&state);
        let handle = thread::Builder::new()
            .name(format!("{base_name}_{thread_index}"))
            .spawn(move || thread_state.thread_function())?;
        Ok(Self {
            state,
            handle: Some(handle),
        })
    }

    fn signal(&self) {
        self.state.still_looping.store(true, Ordering::Release);
        self.state.begin.store(true, Ordering::Release);
        if let Some(handle) = &self.handle {
            handle.thread().unpark();
        }
    }

    fn thread_id(&self) -> Option<ThreadId> {
        self.handle.as_ref().map(|h| h.thread().id())
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.state.quit.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                warn!(
                    "worker {} terminated abnormally",
                    self.state.thread_index
                );
            }
        }
    }
}

/// Blocks on drop until every worker has released its task slot.
struct CompletionGuard<'a> {
    workers: &'a [Worker],
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        for worker in self.workers {
            while worker.state.has_task.load(Ordering::Acquire) {
                std::hint::spin_loop();
            }
        }
    }
}

pub struct ThreadPool {
    base_name: String,
    workers: Vec<Worker>,
    active: bool,
    diagnostic_timeout: Option<Duration>,
}

impl ThreadPool {
    /// Creates a pool with no extra workers; the owner runs everything.
    #[must_use]
    pub fn new(base_name: &str) -> Self {
        Self {
            base_name: base_name.to_owned(),
            workers: Vec::new(),
            active: false,
            diagnostic_timeout: None,
        }
    }

    /// Largest thread count [`ThreadPool::set_thread_count`] accepts:
    /// half the hardware threads, rounded up, within `[1, MAX_THREADS_COUNT]`.
    #[must_use]
    pub fn max_threads() -> usize {
        let hardware = thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        ((hardware + 1) / 2).clamp(1, MAX_THREADS_COUNT)
    }

    /// Total number of threads taking part in a bracket, owner included.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.workers.len() + 1
    }

    /// Clamps `count` to `[1, max_threads]` and recreates the workers when
    /// the clamped count differs from the current one.
    ///
    /// If the OS refuses to start a thread the pool keeps the workers it
    /// already has and logs a warning.
    pub fn set_thread_count(&mut self, count: usize) {
        let requested = count.clamp(1, Self::max_threads()) - 1;
        if requested == self.workers.len() {
            return;
        }

        self.end();
        self.spawn_workers(requested);
    }

    /// Replaces the workers with `count` fresh ones, without clamping.
    fn spawn_workers(&mut self, count: usize) {
        self.workers.clear();
        for i in 0..count {
            match Worker::spawn(&self.base_name, i + 1) {
                Ok(worker) => self.workers.push(worker),
                Err(err) => {
                    warn!(
                        "{}: could not start worker {} ({err}); running with {} threads",
                        self.base_name,
                        i + 1,
                        self.workers.len() + 1
                    );
                    break;
                }
            }
        }
        debug!(
            "{}: thread count set to {}",
            self.base_name,
            self.thread_count()
        );
    }

    /// Logs a warning when [`ThreadPool::end`] waits longer than `timeout`.
    /// The barrier keeps waiting either way.
    pub fn set_diagnostic_timeout(&mut self, timeout: Option<Duration>) {
        self.diagnostic_timeout = timeout;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Thread ids of the extra workers, in worker order.
    #[must_use]
    pub fn worker_thread_ids(&self) -> Vec<ThreadId> {
        self.workers.iter().filter_map(Worker::thread_id).collect()
    }

    /// Wakes every worker so it starts pulling tasks.
    pub fn begin(&mut self) {
        if self.active {
            return;
        }
        for worker in &self.workers {
            worker.signal();
        }
        self.active = true;
        trace!("{}: begin", self.base_name);
    }

    /// Stops every worker and busy-waits until all of them have left their
    /// loop. Blocks forever if a task never returns.
    pub fn end(&mut self) {
        if !self.active {
            return;
        }
        for worker in &self.workers {
            worker.state.begin.store(false, Ordering::Release);
        }

        let start = Instant::now();
        let mut reported = false;
        for worker in &self.workers {
            while worker.state.still_looping.load(Ordering::Acquire) {
                if let Some(timeout) = self.diagnostic_timeout {
                    if !reported && start.elapsed() > timeout {
                        warn!(
                            "{}: worker {} still looping after {:?}",
                            self.base_name,
                            worker.state.thread_index,
                            start.elapsed()
                        );
                        reported = true;
                    }
                }
                std::hint::spin_loop();
            }
        }
        self.active = false;
        trace!("{}: end", self.base_name);
    }

    /// Runs `f` inside a `begin`/`end` bracket. The bracket is closed even
    /// if `f` panics.
    pub fn bracket<R>(&mut self, f: impl FnOnce(&Self) -> R) -> R {
        struct EndOnDrop<'a>(&'a mut ThreadPool);

        impl Drop for EndOnDrop<'_> {
            fn drop(&mut self) {
                self.0.end();
            }
        }

        self.begin();
        let guard = EndOnDrop(self);
        let result = f(&*guard.0);
        drop(guard);
        result
    }

    /// Runs `job(thread_index, thread_count)` once per thread and returns
    /// when every share has completed.
    ///
    /// Outside a bracket, or with a single thread, all shares run in order
    /// on the calling thread. A panic raised by a worker share is re-raised
    /// here after the other shares have finished.
    pub fn parallel_execute<F>(&self, job: &F)
    where
        F: Fn(usize, usize) + Sync,
    {
        let thread_count = self.thread_count();
        if !self.active || self.workers.is_empty() {
            for thread_index in 0..thread_count {
                job(thread_index, thread_count);
            }
            return;
        }

        let job_ptr: *const Job<'_> = job;
        // SAFETY: only the lifetime is erased. `CompletionGuard` blocks,
        // also while unwinding, until every worker has cleared `has_task`,
        // and workers drop their copy of the pointer before doing so.
        let erased: *const Job<'static> =
            unsafe { std::mem::transmute::<*const Job<'_>, *const Job<'static>>(job_ptr) };

        for worker in &self.workers {
            *worker.state.task.lock() = Some(TaskRef {
                job: erased,
                thread_count,
            });
            worker.state.has_task.store(true, Ordering::Release);
        }

        {
            let _wait = CompletionGuard {
                workers: &self.workers,
            };
            job(0, thread_count);
        }

        for worker in &self.workers {
            if let Some(payload) = worker.state.panic.lock().take() {
                panic::resume_unwind(payload);
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.end();
        self.workers.clear();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("base_name", &self.base_name)
            .field("thread_count", &self.thread_count())
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}
