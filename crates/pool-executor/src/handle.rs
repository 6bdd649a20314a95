//! Result handles for submitted work
//!
//! A [`ResultHandle`] is the reader side of a single-assignment slot. The
//! writer side, [`Resolver`], is owned by the work item and consumed when the
//! item resolves. A resolver dropped while the slot is still pending marks
//! it cancelled, so every handle reaches a terminal state.
//!
//! Values are read by clone ([`ResultHandle::result`]) or moved out
//! ([`ResultHandle::into_result`], or awaiting the handle). After a move the
//! slot keeps only the terminal status.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::TaskError;

/// Observable state of a result handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStatus {
    /// Not resolved yet
    Pending,
    /// Resolved with a value
    Succeeded,
    /// Resolved with an error or panic
    Failed,
    /// Discarded before completion
    Cancelled,
}

impl HandleStatus {
    /// Whether the handle has reached a terminal state
    pub fn is_terminal(self) -> bool {
        self != Self::Pending
    }
}

enum Slot<T> {
    Pending,
    Done(Result<T, TaskError>),
    Taken(HandleStatus),
}

fn outcome_status<T>(outcome: &Result<T, TaskError>) -> HandleStatus {
    match outcome {
        Ok(_) => HandleStatus::Succeeded,
        Err(TaskError::Cancelled) => HandleStatus::Cancelled,
        Err(_) => HandleStatus::Failed,
    }
}

struct Shared<T> {
    id: u64,
    slot: Mutex<Slot<T>>,
    resolved: Notify,
}

impl<T> Shared<T> {
    /// Store the outcome if still pending; returns whether it was stored
    ///
    /// A rejected outcome is dropped after the lock is released; its
    /// destructor may run user code.
    fn complete(&self, outcome: Result<T, TaskError>) -> bool {
        let mut slot = self.slot.lock();
        if !matches!(*slot, Slot::Pending) {
            drop(slot);
            drop(outcome);
            return false;
        }
        *slot = Slot::Done(outcome);
        drop(slot);

        self.resolved.notify_waiters();
        true
    }

    fn status(&self) -> HandleStatus {
        match &*self.slot.lock() {
            Slot::Pending => HandleStatus::Pending,
            Slot::Done(outcome) => outcome_status(outcome),
            Slot::Taken(status) => *status,
        }
    }

    /// Move the outcome out, leaving its status behind
    fn take(&self) -> Option<Result<T, TaskError>> {
        let mut slot = self.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Pending) {
            Slot::Pending => None,
            Slot::Taken(status) => {
                *slot = Slot::Taken(status);
                Some(Err(TaskError::Taken))
            }
            Slot::Done(outcome) => {
                *slot = Slot::Taken(outcome_status(&outcome));
                Some(outcome)
            }
        }
    }
}

/// Create a linked handle/resolver pair for item `id`
pub(crate) fn pair<T>(id: u64) -> (ResultHandle<T>, Resolver<T>) {
    let shared = Arc::new(Shared {
        id,
        slot: Mutex::new(Slot::Pending),
        resolved: Notify::new(),
    });
    (
        ResultHandle {
            shared: Arc::clone(&shared),
        },
        Resolver { shared },
    )
}

/// Handle to the eventual outcome of a submitted work item
///
/// Cloning is cheap; every clone observes the same outcome. The value can
/// be read any number of times with [`result`](Self::result) when `T: Clone`,
/// or moved out once with [`into_result`](Self::into_result) or by awaiting
/// the handle. Reads after a move fail with [`TaskError::Taken`].
///
/// # Example
///
/// ```ignore
/// let handle = pool.submit(|| async { Ok::<_, anyhow::Error>(2 + 2) })?;
/// assert_eq!(handle.result().await?, 4);
/// ```
pub struct ResultHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for ResultHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for ResultHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultHandle")
            .field("id", &self.shared.id)
            .field("status", &self.status())
            .finish()
    }
}

impl<T> ResultHandle<T> {
    /// Sequence number of the submitted item
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Current status
    pub fn status(&self) -> HandleStatus {
        self.shared.status()
    }

    /// Whether the handle is in a terminal state
    pub fn is_done(&self) -> bool {
        self.status().is_terminal()
    }

    /// Whether the handle was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.status() == HandleStatus::Cancelled
    }

    /// Cancel the item if it has not resolved yet
    ///
    /// Returns `false` if the handle was already terminal. A worker that
    /// later dequeues a cancelled item skips it without running it.
    pub fn cancel(&self) -> bool {
        self.shared.complete(Err(TaskError::Cancelled))
    }

    /// Wait until the handle reaches a terminal state
    pub async fn wait(&self) {
        loop {
            let notified = self.shared.resolved.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_done() {
                return;
            }
            notified.await;
        }
    }

    /// Move the outcome out if already terminal, without waiting
    ///
    /// Works for any `T`. Later reads through this or any other clone
    /// return [`TaskError::Taken`]; [`status`](Self::status) is unaffected.
    pub fn take(&self) -> Option<Result<T, TaskError>> {
        self.shared.take()
    }

    /// Wait for the outcome and move it out of the handle
    pub async fn into_result(self) -> Result<T, TaskError> {
        loop {
            self.wait().await;
            if let Some(outcome) = self.take() {
                return outcome;
            }
        }
    }
}

impl<T: Clone> ResultHandle<T> {
    /// Outcome if already terminal, without waiting
    pub fn try_result(&self) -> Option<Result<T, TaskError>> {
        match &*self.shared.slot.lock() {
            Slot::Pending => None,
            Slot::Done(outcome) => Some(outcome.clone()),
            Slot::Taken(_) => Some(Err(TaskError::Taken)),
        }
    }

    /// Wait for and return the outcome
    pub async fn result(&self) -> Result<T, TaskError> {
        loop {
            self.wait().await;
            if let Some(outcome) = self.try_result() {
                return outcome;
            }
        }
    }
}

/// Awaiting a handle moves the outcome out, like
/// [`into_result`](ResultHandle::into_result)
impl<T> IntoFuture for ResultHandle<T>
where
    T: Send + 'static,
{
    type Output = Result<T, TaskError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.into_result())
    }
}

/// Writer side of a result handle
pub(crate) struct Resolver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Resolver<T> {
    /// Resolve with the item outcome; no-op if the caller already cancelled
    pub(crate) fn resolve(self, outcome: Result<T, TaskError>) -> bool {
        self.shared.complete(outcome)
    }

    /// Mark the handle cancelled
    pub(crate) fn cancel(self) -> bool {
        self.shared.complete(Err(TaskError::Cancelled))
    }

    /// Whether the handle already reached a terminal state
    pub(crate) fn is_done(&self) -> bool {
        self.shared.status().is_terminal()
    }
}

impl<T> Drop for Resolver<T> {
    fn drop(&mut self) {
        self.shared.complete(Err(TaskError::Cancelled));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_starts_pending() {
        let (handle, _resolver) = pair::<u32>(1);

        assert_eq!(handle.id(), 1);
        assert_eq!(handle.status(), HandleStatus::Pending);
        assert!(handle.try_result().is_none());
    }

    #[test]
    fn test_resolves_exactly_once() {
        let (handle, resolver) = pair::<u32>(1);
        let other = handle.clone();

        assert!(resolver.resolve(Ok(5)));

        assert_eq!(handle.status(), HandleStatus::Succeeded);
        assert_eq!(other.try_result().unwrap().unwrap(), 5);
        // Terminal: a late cancel has no effect
        assert!(!handle.cancel());
        assert_eq!(handle.try_result().unwrap().unwrap(), 5);
    }

    #[test]
    fn test_failure_status() {
        let (handle, resolver) = pair::<u32>(1);
        resolver.resolve(Err(TaskError::failed(anyhow::anyhow!("nope"))));

        assert_eq!(handle.status(), HandleStatus::Failed);
        let err = handle.try_result().unwrap().unwrap_err();
        assert_eq!(err.failure().unwrap().to_string(), "nope");
    }

    #[test]
    fn test_caller_cancel_wins_over_late_resolve() {
        let (handle, resolver) = pair::<u32>(1);

        assert!(handle.cancel());
        assert!(resolver.is_done());
        assert!(!resolver.resolve(Ok(1)));
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_dropped_resolver_cancels() {
        let (handle, resolver) = pair::<u32>(1);
        drop(resolver);

        assert!(handle.is_cancelled());
        assert!(handle.try_result().unwrap().unwrap_err().is_cancelled());
    }

    #[test]
    fn test_wait_wakes_on_resolve() {
        let (handle, resolver) = pair::<&'static str>(1);
        let mut waiting = task::spawn(handle.result());

        assert_pending!(waiting.poll());

        resolver.resolve(Ok("done"));

        assert!(waiting.is_woken());
        let outcome = assert_ready!(waiting.poll());
        assert_eq!(outcome.unwrap(), "done");
    }

    /// Deliberately not `Clone`
    #[derive(Debug, PartialEq)]
    struct Ticket {
        seat: u32,
    }

    #[test]
    fn test_take_moves_value_out_once() {
        let (handle, resolver) = pair::<Ticket>(1);
        let other = handle.clone();

        assert!(handle.take().is_none());
        resolver.resolve(Ok(Ticket { seat: 12 }));

        assert_eq!(handle.take().unwrap().unwrap(), Ticket { seat: 12 });
        assert!(matches!(other.take(), Some(Err(TaskError::Taken))));
        assert_eq!(other.status(), HandleStatus::Succeeded);
        assert!(!other.cancel());
    }

    #[test]
    fn test_result_after_take_reports_taken() {
        let (handle, resolver) = pair::<u32>(1);
        resolver.resolve(Ok(3));

        assert_eq!(handle.take().unwrap().unwrap(), 3);
        assert!(matches!(handle.try_result(), Some(Err(TaskError::Taken))));
    }

    #[test]
    fn test_into_result_waits_for_non_clone_value() {
        let (handle, resolver) = pair::<Ticket>(1);
        let mut waiting = task::spawn(handle.into_result());

        assert_pending!(waiting.poll());

        resolver.resolve(Ok(Ticket { seat: 7 }));

        assert!(waiting.is_woken());
        assert_eq!(assert_ready!(waiting.poll()).unwrap(), Ticket { seat: 7 });
    }

    #[test]
    fn test_take_keeps_cancelled_status() {
        let (handle, resolver) = pair::<Ticket>(1);
        drop(resolver);

        assert!(handle.take().unwrap().unwrap_err().is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_into_future() {
        let (handle, resolver) = pair::<String>(3);

        tokio::spawn(async move {
            resolver.resolve(Ok("hello".to_string()));
        });

        assert_eq!(handle.await.unwrap(), "hello");
    }
}
