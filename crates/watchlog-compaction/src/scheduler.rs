//! Sweep scheduler and lifecycle.
//!
//! The scheduler owns the worker pool and a single loop task. The loop waits
//! on a periodic timer and runs one full sweep per tick; sweeps never
//! overlap because the loop does not wait on the timer while a sweep runs.
//!
//! ```text
//! Created ──init_pool──▶ Initialized ──start──▶ Running ──stop──▶ Stopping ──▶ Stopped
//!                             └───────────────stop (release pool)───────────────▶┘
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use watchlog_common::clock::SharedClock;
use watchlog_common::config::CompactionConfig;
use watchlog_store::StoreAdapter;

use crate::backoff::RetryPolicy;
use crate::error::{CompactionError, CompactionResult};
use crate::migration::MigrationExecutor;
use crate::pool::WorkerPool;
use crate::scanner::CursorScanner;
use crate::stats::SchedulerStats;
use crate::sweep::{SweepEnd, Sweeper};

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Constructed; no pool yet.
    Created,
    /// Pool allocated; loop not started.
    Initialized,
    /// Loop running.
    Running,
    /// Stop in progress.
    Stopping,
    /// Stopped; terminal.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Lifecycle of a background task.
pub trait Lifecycle: Send + Sync {
    /// Allocates the worker pool.
    fn init_pool(&self) -> CompactionResult<()>;

    /// Spawns the background loop. Must be called inside a Tokio runtime.
    fn start(&self) -> CompactionResult<()>;

    /// Cancels the loop, waits for in-flight work and releases the pool.
    fn stop(&self) -> Pin<Box<dyn Future<Output = CompactionResult<()>> + Send + '_>>;

    /// Returns the current state.
    fn state(&self) -> LifecycleState;
}

/// Runtime options of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Number of concurrent migration tasks.
    pub worker_pool_size: usize,
    /// Timer period between sweeps.
    pub sweep_interval: Duration,
    /// Rows younger than this are left in staging.
    pub age_limit: Duration,
    /// Scan retry policy.
    pub retry: RetryPolicy,
    /// Time allowed for draining on stop.
    pub shutdown_grace: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from_config_unchecked(&CompactionConfig::default())
    }
}

impl SchedulerOptions {
    /// Builds options from a validated configuration.
    pub fn from_config(config: &CompactionConfig) -> CompactionResult<Self> {
        config.validate()?;
        Ok(Self::from_config_unchecked(config))
    }

    fn from_config_unchecked(config: &CompactionConfig) -> Self {
        Self {
            worker_pool_size: config.worker_pool_size,
            sweep_interval: config.sweep_cooldown(),
            age_limit: config.age_limit(),
            retry: RetryPolicy::from(&config.retry),
            shutdown_grace: config.shutdown_grace(),
        }
    }

    /// Sets the pool size.
    #[must_use]
    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    /// Sets the timer period.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the age limit.
    #[must_use]
    pub fn with_age_limit(mut self, age_limit: Duration) -> Self {
        self.age_limit = age_limit;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the shutdown grace period.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

#[derive(Debug)]
struct Inner {
    state: LifecycleState,
    pool: Option<Arc<WorkerPool>>,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

/// Periodic watch-history compaction scheduler.
#[derive(Debug)]
pub struct Scheduler {
    store: Arc<dyn StoreAdapter>,
    clock: SharedClock,
    options: SchedulerOptions,
    stats: Arc<SchedulerStats>,
    inner: Mutex<Inner>,
}

impl Scheduler {
    /// Creates a scheduler in the `Created` state.
    pub fn new(store: Arc<dyn StoreAdapter>, clock: SharedClock, options: SchedulerOptions) -> Self {
        Self {
            store,
            clock,
            options,
            stats: Arc::new(SchedulerStats::new()),
            inner: Mutex::new(Inner {
                state: LifecycleState::Created,
                pool: None,
                cancel: None,
                handle: None,
            }),
        }
    }

    /// Returns the options.
    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Returns the statistics.
    pub fn stats(&self) -> &Arc<SchedulerStats> {
        &self.stats
    }

    fn sweeper(&self, pool: Arc<WorkerPool>) -> Sweeper {
        Sweeper::new(
            CursorScanner::new(Arc::clone(&self.store)),
            MigrationExecutor::new(Arc::clone(&self.store), Arc::clone(&self.clock)),
            pool,
            Arc::clone(&self.clock),
            self.options.age_limit,
            self.options.retry,
            Arc::clone(&self.stats),
        )
    }

    async fn drain(
        handle: Option<JoinHandle<()>>,
        pool: Option<Arc<WorkerPool>>,
    ) {
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!("sweep loop panicked: {}", e);
                }
            }
        }
        if let Some(pool) = pool {
            pool.release().await;
        }
    }
}

impl Lifecycle for Scheduler {
    fn init_pool(&self) -> CompactionResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != LifecycleState::Created {
            return Err(CompactionError::invalid_state("initialize pool", inner.state));
        }

        let pool = WorkerPool::new(self.options.worker_pool_size)?;
        info!(size = pool.size(), "worker pool initialized");
        inner.pool = Some(Arc::new(pool));
        inner.state = LifecycleState::Initialized;
        Ok(())
    }

    fn start(&self) -> CompactionResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != LifecycleState::Initialized {
            return Err(CompactionError::invalid_state("start", inner.state));
        }
        let pool = inner
            .pool
            .clone()
            .ok_or_else(|| CompactionError::invalid_state("start", inner.state))?;

        let cancel = CancellationToken::new();
        let sweeper = self.sweeper(pool);
        let period = self.options.sweep_interval;
        let span = info_span!("compaction", task = "watched");

        let handle = tokio::spawn(
            run_loop(sweeper, period, cancel.clone()).instrument(span),
        );

        info!(
            interval_ms = period.as_millis() as u64,
            age_limit_secs = self.options.age_limit.as_secs(),
            "compaction scheduler started"
        );
        inner.cancel = Some(cancel);
        inner.handle = Some(handle);
        inner.state = LifecycleState::Running;
        Ok(())
    }

    fn stop(&self) -> Pin<Box<dyn Future<Output = CompactionResult<()>> + Send + '_>> {
        Box::pin(async move {
            let (cancel, handle, pool) = {
                let mut inner = self.inner.lock();
                match inner.state {
                    LifecycleState::Stopped => return Ok(()),
                    LifecycleState::Stopping => {
                        return Err(CompactionError::invalid_state("stop", inner.state))
                    }
                    LifecycleState::Created => {
                        inner.state = LifecycleState::Stopped;
                        return Ok(());
                    }
                    LifecycleState::Initialized | LifecycleState::Running => {}
                }
                inner.state = LifecycleState::Stopping;
                (inner.cancel.take(), inner.handle.take(), inner.pool.take())
            };

            info!("stopping compaction scheduler");
            if let Some(cancel) = &cancel {
                cancel.cancel();
            }

            let abort: Option<AbortHandle> = handle.as_ref().map(JoinHandle::abort_handle);
            let forced_pool = pool.clone();
            let grace = self.options.shutdown_grace;

            let result = match tokio::time::timeout(grace, Self::drain(handle, pool)).await {
                Ok(()) => {
                    info!("compaction scheduler stopped");
                    Ok(())
                }
                Err(_) => {
                    warn!(
                        grace_ms = grace.as_millis() as u64,
                        "in-flight migrations did not drain in time, aborting"
                    );
                    if let Some(abort) = abort {
                        abort.abort();
                    }
                    if let Some(pool) = forced_pool {
                        pool.close();
                    }
                    Err(CompactionError::ShutdownTimeout {
                        grace_ms: grace.as_millis() as u64,
                    })
                }
            };

            self.inner.lock().state = LifecycleState::Stopped;
            result
        })
    }

    fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_loop(sweeper: Sweeper, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // A panicking sweep must not end the loop.
        let task = {
            let sweeper = sweeper.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { sweeper.run(&cancel).await }.in_current_span())
        };
        let guard = AbortOnDrop(task.abort_handle());

        match task.await {
            Ok(report) => {
                if let SweepEnd::Abandoned { attempts } = report.end {
                    warn!(attempts, "sweep abandoned, restarting from the first partition next tick");
                }
            }
            Err(e) if e.is_panic() => error!("sweep panicked: {}", e),
            Err(_) => {}
        }
        drop(guard);
    }

    info!("sweep loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchlog_common::clock::ManualClock;
    use watchlog_common::types::Timestamp;
    use watchlog_store::MemoryStore;

    fn scheduler(options: SchedulerOptions) -> Scheduler {
        let clock: SharedClock = ManualClock::shared(Timestamp::from_secs(1_700_000_000));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        Scheduler::new(store, clock, options)
    }

    fn fast() -> SchedulerOptions {
        SchedulerOptions::default()
            .with_sweep_interval(Duration::from_millis(100))
            .with_worker_pool_size(2)
    }

    #[test]
    fn test_options_from_config() {
        let config = CompactionConfig::default().with_worker_pool_size(4);
        let options = SchedulerOptions::from_config(&config).unwrap();
        assert_eq!(options.worker_pool_size, 4);
        assert_eq!(options.sweep_interval, Duration::from_secs(60));

        let bad = CompactionConfig::default().with_sweep_cooldown_seconds(1);
        assert!(SchedulerOptions::from_config(&bad).is_err());
    }

    #[test]
    fn test_init_pool_rejects_zero_size() {
        let scheduler = scheduler(fast().with_worker_pool_size(0));
        assert!(scheduler.init_pool().is_err());
        assert_eq!(scheduler.state(), LifecycleState::Created);
    }

    #[tokio::test]
    async fn test_start_requires_pool() {
        let scheduler = scheduler(fast());
        let err = scheduler.start().unwrap_err();
        assert!(matches!(
            err,
            CompactionError::InvalidState {
                state: LifecycleState::Created,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_fails() {
        let scheduler = scheduler(fast());
        scheduler.init_pool().unwrap();
        scheduler.start().unwrap();
        assert!(scheduler.start().is_err());
        assert!(scheduler.init_pool().is_err());
        scheduler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_sweep_after_one_interval() {
        let scheduler = scheduler(fast());
        scheduler.init_pool().unwrap();
        scheduler.start().unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(scheduler.stats().snapshot().sweeps_started, 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(scheduler.stats().snapshot().sweeps_started, 1);

        scheduler.stop().await.unwrap();
        assert_eq!(scheduler.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_initialized_releases_pool() {
        let scheduler = scheduler(fast());
        scheduler.init_pool().unwrap();
        scheduler.stop().await.unwrap();
        assert_eq!(scheduler.state(), LifecycleState::Stopped);

        scheduler.stop().await.unwrap();
        assert!(scheduler.start().is_err());
    }
}
