//! Bounded worker pool.
//!
//! The pool hands out one slot per running task. `submit` waits for a free
//! slot instead of rejecting work, which back-pressures the scanner. Tasks
//! submitted during one sweep are collected in a [`TaskGroup`] so the sweep
//! can wait for all of them before it reports completion.
//!
//! ```text
//!   scanner ──submit──▶ [slot][slot][slot] ──▶ TaskGroup::wait()
//!             (waits when all slots are busy)
//! ```

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::error::{CompactionError, CompactionResult};

/// Fixed-size pool of task slots.
#[derive(Debug)]
pub struct WorkerPool {
    size: u32,
    slots: Arc<Semaphore>,
    closed: AtomicBool,
}

impl WorkerPool {
    /// Creates a pool with `size` slots.
    pub fn new(size: usize) -> CompactionResult<Self> {
        if size == 0 {
            return Err(CompactionError::invalid_config(
                "worker pool size must be at least 1",
            ));
        }
        let size = u32::try_from(size)
            .ok()
            .filter(|s| (*s as usize) <= Semaphore::MAX_PERMITS)
            .ok_or_else(|| {
                CompactionError::invalid_config(format!("worker pool size {size} is too large"))
            })?;

        Ok(Self {
            size,
            slots: Arc::new(Semaphore::new(size as usize)),
            closed: AtomicBool::new(false),
        })
    }

    /// Returns the number of slots.
    pub fn size(&self) -> usize {
        self.size as usize
    }

    /// Returns the number of free slots.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Returns true once the pool stopped accepting tasks.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Runs `task` on a free slot, waiting for one if necessary.
    ///
    /// The task is tracked by `group`. Fails with `PoolClosed` after
    /// [`release`](Self::release) or [`close`](Self::close).
    pub async fn submit<F>(&self, group: &mut TaskGroup, task: F) -> CompactionResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_closed() {
            return Err(CompactionError::PoolClosed);
        }

        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| CompactionError::PoolClosed)?;

        group.tasks.spawn(async move {
            let _permit = permit;
            task.await;
        });
        group.reap();
        Ok(())
    }

    /// Stops accepting tasks, waits for in-flight tasks to finish, and
    /// releases every slot.
    pub async fn release(&self) {
        self.closed.store(true, Ordering::Release);
        match self.slots.acquire_many(self.size).await {
            Ok(all) => {
                all.forget();
                debug!(slots = self.size, "worker pool drained");
            }
            Err(_) => debug!("worker pool already closed"),
        }
        self.slots.close();
    }

    /// Stops accepting tasks without waiting for in-flight ones.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.slots.close();
    }
}

/// Tasks submitted during one sweep.
#[derive(Debug, Default)]
pub struct TaskGroup {
    tasks: JoinSet<()>,
    finished: usize,
    panicked: usize,
}

impl TaskGroup {
    /// Creates an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of tasks not yet joined.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for every task in the group.
    ///
    /// Returns the number of tasks that panicked.
    pub async fn wait(&mut self) -> usize {
        while let Some(result) = self.tasks.join_next().await {
            self.record(result);
        }
        self.panicked
    }

    /// Returns the number of tasks joined so far.
    pub fn finished(&self) -> usize {
        self.finished
    }

    /// Joins tasks that already completed.
    fn reap(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            self.record(result);
        }
    }

    fn record(&mut self, result: Result<(), tokio::task::JoinError>) {
        self.finished += 1;
        if let Err(e) = result {
            if e.is_panic() {
                self.panicked += 1;
                error!("migration task panicked: {}", e);
            }
        }
    }
}
