//! Pool executor
//!
//! Owns the queue, the worker tasks and the lifecycle state. Submission is
//! synchronous and never waits: it either enqueues or fails immediately.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument};

use crate::config::ExecutorConfig;
use crate::error::ExecutorError;
use crate::handle::{self, ResultHandle};
use crate::item::WorkItem;
use crate::queue::BoundedQueue;
use crate::worker;

/// Executor lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// Created, workers not spawned yet
    NotStarted,
    /// Workers running, submissions accepted
    Running,
    /// Shut down; not restartable
    Stopped,
}

struct Inner {
    config: ExecutorConfig,
    queue: Arc<BoundedQueue<WorkItem>>,
    state: RwLock<ExecutorState>,
    shutdown: CancellationToken,
    workers: TaskTracker,
    next_id: AtomicU64,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Bounded worker pool for async work items
///
/// Cloning is cheap and every clone drives the same pool. Dropping the last
/// clone stops the workers.
///
/// # Example
///
/// ```ignore
/// use pool_executor::{ExecutorConfig, PoolExecutor};
///
/// let pool = PoolExecutor::new(ExecutorConfig::new().with_max_workers(2));
/// pool.start()?;
///
/// let handle = pool.submit(|| async { Ok::<_, anyhow::Error>("done") })?;
///
/// pool.shutdown(true).await;
/// assert_eq!(handle.result().await?, "done");
/// ```
#[derive(Clone)]
pub struct PoolExecutor {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PoolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolExecutor")
            .field("name", &self.inner.config.name)
            .field("state", &self.state())
            .field("queued", &self.queued())
            .finish()
    }
}

impl PoolExecutor {
    /// Create an executor; no workers run until [`start`](Self::start)
    pub fn new(config: ExecutorConfig) -> Self {
        let queue = Arc::new(BoundedQueue::new(config.max_queue_size));
        Self {
            inner: Arc::new(Inner {
                config,
                queue,
                state: RwLock::new(ExecutorState::NotStarted),
                shutdown: CancellationToken::new(),
                workers: TaskTracker::new(),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Run `body` against a started executor, shutting it down afterwards
    ///
    /// Shutdown waits for all outstanding work and happens on every exit
    /// path of `body`, including early returns of an error value and
    /// panics (the panic resumes once the pool has stopped).
    pub async fn scoped<F, Fut, R>(config: ExecutorConfig, body: F) -> Result<R, ExecutorError>
    where
        F: FnOnce(PoolExecutor) -> Fut,
        Fut: Future<Output = R>,
    {
        let pool = Self::new(config);
        pool.start()?;

        let scope = pool.clone();
        let outcome = AssertUnwindSafe(async move { body(scope).await })
            .catch_unwind()
            .await;

        pool.shutdown(true).await;

        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Spawn the worker loops on the current tokio runtime
    pub fn start(&self) -> Result<(), ExecutorError> {
        let mut state = self.inner.state.write();
        match *state {
            ExecutorState::Running => return Err(ExecutorError::AlreadyRunning),
            ExecutorState::Stopped => return Err(ExecutorError::Stopped),
            ExecutorState::NotStarted => {}
        }

        let runtime = Handle::try_current()?;
        let workers = self.inner.config.worker_count();

        info!(
            pool = %self.inner.config.name,
            workers,
            max_queue_size = self.inner.config.max_queue_size,
            "Starting pool executor"
        );

        for index in 0..workers {
            let queue = Arc::clone(&self.inner.queue);
            let token = self.inner.shutdown.clone();
            let supervisor = worker::supervise(index, self.inner.shutdown.clone(), move || {
                worker::run(index, Arc::clone(&queue), token.clone())
            });
            self.inner.workers.spawn_on(supervisor, &runtime);
        }

        *state = ExecutorState::Running;
        Ok(())
    }

    /// Submit a callable for execution
    ///
    /// Arguments are captured by the closure. Fails with
    /// [`ExecutorError::NotRunning`] outside the running state and with
    /// [`ExecutorError::QueueFull`] when the bounded queue is at capacity.
    pub fn submit<F, Fut, T, E>(&self, func: F) -> Result<ResultHandle<T>, ExecutorError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        // Held across the enqueue so shutdown cannot drain in between
        let state = self.inner.state.read();
        if *state != ExecutorState::Running {
            return Err(ExecutorError::NotRunning);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (handle, resolver) = handle::pair(id);

        if self
            .inner
            .queue
            .try_push(WorkItem::new(id, func, resolver))
            .is_err()
        {
            let capacity = self.inner.queue.capacity();
            debug!(
                pool = %self.inner.config.name,
                item = id,
                capacity,
                "Queue full, rejecting item"
            );
            return Err(ExecutorError::QueueFull { capacity });
        }

        debug!(pool = %self.inner.config.name, item = id, "Added to queue");
        Ok(handle)
    }

    /// Submit `func` once per argument, in iteration order
    ///
    /// Several input sequences are combined by the caller with
    /// [`Iterator::zip`], which stops at the shortest. Handles come back in
    /// submission order; nothing is awaited. The first failed submission
    /// aborts the map with its error.
    pub fn map<I, F, Fut, T, E>(
        &self,
        func: F,
        args: I,
    ) -> Result<Vec<ResultHandle<T>>, ExecutorError>
    where
        I: IntoIterator,
        I::Item: Send + 'static,
        F: Fn(I::Item) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        if !self.is_running() {
            return Err(ExecutorError::NotRunning);
        }

        let func = Arc::new(func);
        args.into_iter()
            .map(|arg| {
                let func = Arc::clone(&func);
                self.submit(move || (*func)(arg))
            })
            .collect()
    }

    /// Stop the executor
    ///
    /// With `wait`, first suspends until every enqueued item has been
    /// processed. Then rejects new submissions, cancels items still queued,
    /// stops the workers (interrupting any in-flight item) and waits for
    /// them to exit. Calling it again after the pool stopped does nothing.
    #[instrument(skip(self), fields(pool = %self.inner.config.name))]
    pub async fn shutdown(&self, wait: bool) {
        if self.state() == ExecutorState::Stopped {
            debug!("Pool executor already stopped");
            return;
        }

        info!(wait, "Shutting down pool executor");

        if wait {
            self.inner.queue.join().await;
        }

        *self.inner.state.write() = ExecutorState::Stopped;

        let mut cancelled = 0usize;
        while let Some(item) = self.inner.queue.try_pop() {
            item.cancel();
            self.inner.queue.task_done();
            cancelled += 1;
        }
        if cancelled > 0 {
            debug!(cancelled, "Cancelled queue contents");
        }

        debug!("Cancelling workers");
        self.inner.shutdown.cancel();
        self.inner.workers.close();
        self.inner.workers.wait().await;

        info!("Pool executor stopped");
    }

    /// Current lifecycle state
    pub fn state(&self) -> ExecutorState {
        *self.inner.state.read()
    }

    /// Whether submissions are accepted
    pub fn is_running(&self) -> bool {
        self.state() == ExecutorState::Running
    }

    /// Executor configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.inner.config
    }

    /// Executor name
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Items waiting to be picked up by a worker
    pub fn queued(&self) -> usize {
        self.inner.queue.len()
    }

    /// Items queued or in flight
    pub fn unfinished(&self) -> usize {
        self.inner.queue.unfinished()
    }
}
