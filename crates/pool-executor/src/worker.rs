//! Worker loop
//!
//! Each worker repeatedly dequeues an item and runs it until the shared
//! cancellation token fires. Item failures and panics are recorded on the
//! item's handle and never end the loop. A loop that unwinds anyway is
//! restarted by its supervisor while the pool is running.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::panic_message;
use crate::item::WorkItem;
use crate::queue::BoundedQueue;

/// Marks a dequeued item done when dropped, whatever path the worker took
struct DoneGuard<'a> {
    queue: &'a BoundedQueue<WorkItem>,
}

impl Drop for DoneGuard<'_> {
    fn drop(&mut self) {
        self.queue.task_done();
    }
}

/// Run one worker until `shutdown` is cancelled
pub(crate) async fn run(
    index: usize,
    queue: Arc<BoundedQueue<WorkItem>>,
    shutdown: CancellationToken,
) {
    debug!(worker = index, "Worker started");

    loop {
        let item = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            item = queue.pop() => item,
        };
        let _done = DoneGuard { queue: &queue };
        let item_id = item.id();

        if item.is_cancelled() {
            trace!(worker = index, item = item_id, "Skipping cancelled item");
            continue;
        }

        trace!(worker = index, item = item_id, "Executing item");
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!(worker = index, item = item_id, "Interrupted in-flight item");
                break;
            }
            _ = item.invoke() => {}
        }
    }

    debug!(worker = index, "Worker exited");
}

/// Keep worker `index` alive until `shutdown` is cancelled
///
/// `start_loop` builds a fresh worker loop. A loop that panics is logged and
/// replaced unless the pool is already shutting down. The item it was
/// holding has been released by then: its handle is cancelled and the queue
/// counts it done.
pub(crate) async fn supervise<F, Fut>(
    index: usize,
    shutdown: CancellationToken,
    mut start_loop: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut restarts = 0u32;
    loop {
        let Err(payload) = AssertUnwindSafe(start_loop()).catch_unwind().await else {
            return;
        };

        warn!(
            worker = index,
            restarts,
            panic = %panic_message(payload.as_ref()),
            "Worker terminated unexpectedly"
        );
        if shutdown.is_cancelled() {
            return;
        }
        restarts += 1;
        debug!(worker = index, restarts, "Restarting worker");
    }
}
