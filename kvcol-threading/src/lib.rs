//! Bounded worker pool used for the parallel page decompression fan-out.
//!
//! Work is submitted inside [`TaskScheduler::run`]; every task submitted
//! through the [`TaskGroup`] handed to the closure has finished when `run`
//! returns. Tasks may borrow from the caller's stack for the duration of the
//! call.

use std::sync::atomic::{AtomicU64, Ordering};

use kvcol_result::{Error, Result};

/// Fixed-size pool of worker threads.
#[derive(Debug)]
pub struct TaskScheduler {
    pool: rayon::ThreadPool,
    tasks_submitted: AtomicU64,
}

impl TaskScheduler {
    /// Creates a pool with `n_threads` workers.
    pub fn new(n_threads: usize) -> Result<Self> {
        if n_threads == 0 {
            return Err(Error::InvalidArgumentError(
                "task scheduler needs at least one worker".into(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i| format!("kvcol-worker-{i}"))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build worker pool: {e}")))?;
        tracing::debug!(n_threads, "task scheduler started");
        Ok(Self {
            pool,
            tasks_submitted: AtomicU64::new(0),
        })
    }

    pub fn thread_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Total tasks submitted over the scheduler's lifetime.
    pub fn tasks_submitted(&self) -> u64 {
        self.tasks_submitted.load(Ordering::Relaxed)
    }

    /// Runs `op`, then blocks until every task it submitted has completed.
    ///
    /// A panicking task is re-raised on the calling thread once the others
    /// have finished.
    pub fn run<'scope, OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce(&TaskGroup<'_, 'scope>) -> R + Send,
        R: Send,
    {
        let counter = &self.tasks_submitted;
        self.pool.scope(|scope| op(&TaskGroup { scope, counter }))
    }
}

/// Submission handle valid for one [`TaskScheduler::run`] call.
pub struct TaskGroup<'a, 'scope> {
    scope: &'a rayon::Scope<'scope>,
    counter: &'a AtomicU64,
}

impl<'scope> TaskGroup<'_, 'scope> {
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'scope,
    {
        self.counter.fetch_add(1, Ordering::Relaxed);
        self.scope.spawn(move |_| task());
    }
}
