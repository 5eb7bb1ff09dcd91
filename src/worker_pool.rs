//! # Worker Pool Module
//!
//! Bounds connection concurrency. With `MAX_CONNECTION_WORKERS > 0` the
//! acceptor does not spawn a coroutine per connection; it queues accepted
//! sockets to a fixed set of worker coroutines instead.
//!
//! ## Features
//!
//! - **Fixed workers**: N coroutines share one receiver and load balance on their own
//! - **Queue bound**: once `queue_bound` items are waiting or in progress, new
//!   items are handed back to the caller to be shed
//! - **Panic isolation**: a panicking job is logged and the worker keeps going
//! - **Metrics**: queue depth, dispatch, completion and shed counters

use may::sync::mpsc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Configuration for a worker pool
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker coroutines
    pub num_workers: usize,
    /// Items waiting or in progress before new ones are shed
    pub queue_bound: usize,
    /// Stack size for worker coroutines
    pub stack_size: usize,
}

impl WorkerPoolConfig {
    /// `num_workers` workers with a queue of 64 items per worker.
    pub fn new(num_workers: usize, stack_size: usize) -> Self {
        Self {
            num_workers,
            queue_bound: num_workers.saturating_mul(64).max(1),
            stack_size,
        }
    }

    pub fn with_queue_bound(mut self, queue_bound: usize) -> Self {
        self.queue_bound = queue_bound.max(1);
        self
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self::new(4, 0x10000)
    }
}

/// Metrics for a worker pool
#[derive(Debug, Default)]
pub struct WorkerPoolMetrics {
    /// Items refused because the queue was full
    pub shed_count: AtomicU64,
    /// Items queued or in progress
    pub queue_depth: AtomicUsize,
    pub dispatched_count: AtomicU64,
    pub completed_count: AtomicU64,
}

impl WorkerPoolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_shed(&self) {
        self.shed_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self) {
        self.dispatched_count.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completion(&self) {
        self.completed_count.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get_shed_count(&self) -> u64 {
        self.shed_count.load(Ordering::Relaxed)
    }

    pub fn get_queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    pub fn get_dispatched_count(&self) -> u64 {
        self.dispatched_count.load(Ordering::Relaxed)
    }

    pub fn get_completed_count(&self) -> u64 {
        self.completed_count.load(Ordering::Relaxed)
    }
}

/// A fixed set of worker coroutines draining a shared queue.
pub struct WorkerPool<T: Send + 'static> {
    config: WorkerPoolConfig,
    sender: mpsc::Sender<T>,
    /// Keeps the channel open even when no worker could be spawned.
    _receiver: Arc<mpsc::Receiver<T>>,
    metrics: Arc<WorkerPoolMetrics>,
    name: String,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Spawn the workers; each runs `job` for every item it receives.
    ///
    /// # Safety
    ///
    /// Spawns coroutines through `may::coroutine::Builder::spawn()`, which is
    /// unsafe in the `may` runtime. `job` must not rely on thread-local
    /// storage, since coroutines migrate between worker threads.
    pub unsafe fn new<F>(name: impl Into<String>, config: WorkerPoolConfig, job: F) -> Self
    where
        F: Fn(T) + Send + Clone + 'static,
    {
        let name = name.into();
        let (tx, rx) = mpsc::channel::<T>();
        let rx = Arc::new(rx);
        let metrics = Arc::new(WorkerPoolMetrics::new());

        info!(
            pool = %name,
            num_workers = config.num_workers,
            queue_bound = config.queue_bound,
            stack_size = config.stack_size,
            "Creating worker pool"
        );

        for worker_id in 0..config.num_workers {
            let rx = Arc::clone(&rx);
            let job = job.clone();
            let metrics = Arc::clone(&metrics);
            let pool = name.clone();

            let spawn_result = may::coroutine::Builder::new()
                .stack_size(config.stack_size)
                .spawn(move || {
                    debug!(pool = %pool, worker_id, "Worker coroutine started");
                    // All workers share the receiver; the channel closing ends them.
                    while let Ok(item) = rx.recv() {
                        if let Err(panic) =
                            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| job(item)))
                        {
                            error!(
                                pool = %pool,
                                worker_id,
                                panic_message = ?panic,
                                "Worker job panicked"
                            );
                        }
                        metrics.record_completion();
                    }
                    debug!(pool = %pool, worker_id, "Worker coroutine exiting");
                });

            if let Err(e) = spawn_result {
                error!(pool = %name, worker_id, error = %e, "Failed to spawn worker coroutine");
            }
        }

        Self {
            config,
            sender: tx,
            _receiver: rx,
            metrics,
            name,
        }
    }

    /// Queue `item`, or hand it back when the pool is saturated or gone.
    pub fn dispatch(&self, item: T) -> Result<(), T> {
        if self.metrics.get_queue_depth() >= self.config.queue_bound {
            self.metrics.record_shed();
            return Err(item);
        }
        self.metrics.record_dispatch();
        if let Err(std::sync::mpsc::SendError(item)) = self.sender.send(item) {
            error!(pool = %self.name, "Worker pool channel disconnected");
            self.metrics.record_completion();
            return Err(item);
        }
        Ok(())
    }

    pub fn metrics(&self) -> &Arc<WorkerPoolMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_pool_config() {
        let config = WorkerPoolConfig::new(4, 0x8000);
        assert_eq!(config.queue_bound, 256);
        assert_eq!(config.stack_size, 0x8000);
        assert_eq!(WorkerPoolConfig::new(2, 0).with_queue_bound(0).queue_bound, 1);
    }

    #[test]
    fn test_worker_pool_metrics() {
        let metrics = WorkerPoolMetrics::new();
        metrics.record_dispatch();
        assert_eq!(metrics.get_dispatched_count(), 1);
        assert_eq!(metrics.get_queue_depth(), 1);

        metrics.record_completion();
        assert_eq!(metrics.get_completed_count(), 1);
        assert_eq!(metrics.get_queue_depth(), 0);

        metrics.record_shed();
        assert_eq!(metrics.get_shed_count(), 1);
    }

    #[test]
    fn test_saturated_pool_hands_item_back() {
        // No workers: nothing drains the queue.
        let config = WorkerPoolConfig::new(0, 0x8000).with_queue_bound(2);
        let pool = unsafe { WorkerPool::new("test", config, |_: u32| {}) };
        assert!(pool.dispatch(1).is_ok());
        assert!(pool.dispatch(2).is_ok());
        assert_eq!(pool.dispatch(3), Err(3));
        assert_eq!(pool.metrics().get_shed_count(), 1);
    }
}
