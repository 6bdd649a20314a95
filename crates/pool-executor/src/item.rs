//! Type-erased work items
//!
//! A submitted callable and its result handle's resolver are captured in a
//! [`Call`] and stored behind the [`Invocation`] trait, so the queue holds a
//! single item type regardless of each callable's output type.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::warn;

use crate::error::{panic_message, TaskError};
use crate::handle::Resolver;

/// A queued unit of work, consumed exactly once
pub(crate) trait Invocation: Send {
    /// Whether the result handle is already terminal (caller cancelled)
    fn is_cancelled(&self) -> bool;

    /// Run the callable and resolve the handle with its outcome
    fn invoke(self: Box<Self>) -> BoxFuture<'static, ()>;

    /// Discard without running, cancelling the handle
    fn cancel(self: Box<Self>);
}

struct Call<F, T> {
    func: F,
    resolver: Resolver<T>,
}

impl<F, Fut, T, E> Invocation for Call<F, T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    fn is_cancelled(&self) -> bool {
        self.resolver.is_done()
    }

    fn invoke(self: Box<Self>) -> BoxFuture<'static, ()> {
        let Call { func, resolver } = *self;
        Box::pin(async move {
            let outcome = match AssertUnwindSafe(async move {
                func().await.map_err(Into::<anyhow::Error>::into)
            })
            .catch_unwind()
            .await
            {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(TaskError::failed(error)),
                Err(payload) => Err(TaskError::from_panic(payload)),
            };

            // A handle cancelled mid-flight rejects the value, which is
            // dropped right here
            let resolved = std::panic::catch_unwind(AssertUnwindSafe(move || {
                resolver.resolve(outcome);
            }));
            if let Err(payload) = resolved {
                warn!(
                    panic = %panic_message(payload.as_ref()),
                    "Dropping a discarded result panicked"
                );
            }
        })
    }

    fn cancel(self: Box<Self>) {
        self.resolver.cancel();
    }
}

/// Work item as stored in the queue
pub(crate) struct WorkItem {
    id: u64,
    call: Box<dyn Invocation>,
}

impl WorkItem {
    pub(crate) fn new<F, Fut, T, E>(id: u64, func: F, resolver: Resolver<T>) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        Self {
            id,
            call: Box::new(Call { func, resolver }),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.call.is_cancelled()
    }

    pub(crate) fn invoke(self) -> BoxFuture<'static, ()> {
        self.call.invoke()
    }

    pub(crate) fn cancel(self) {
        self.call.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{pair, HandleStatus};

    async fn explode() -> anyhow::Result<u8> {
        panic!("worker must survive this")
    }

    #[tokio::test]
    async fn test_invoke_resolves_value() {
        let (handle, resolver) = pair(1);
        let item = WorkItem::new(1, || async { Ok::<_, anyhow::Error>(21 * 2) }, resolver);

        assert_eq!(item.id(), 1);
        item.invoke().await;

        assert_eq!(handle.try_result().unwrap().unwrap(), 42);
    }

    struct Volatile;

    impl Drop for Volatile {
        fn drop(&mut self) {
            panic!("volatile value dropped");
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_panicking_drop_of_rejected_value_is_contained() {
        let (handle, resolver) = pair::<Volatile>(1);
        let item = WorkItem::new(
            1,
            || async {
                tokio::task::yield_now().await;
                Ok::<_, anyhow::Error>(Volatile)
            },
            resolver,
        );

        let mut running = tokio_test::task::spawn(item.invoke());
        tokio_test::assert_pending!(running.poll());

        assert!(handle.cancel());
        tokio_test::assert_ready!(running.poll());

        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_invoke_captures_error() {
        let (handle, resolver) = pair::<()>(1);
        let item = WorkItem::new(1, || async { Err(anyhow::anyhow!("bad input")) }, resolver);

        item.invoke().await;

        assert_eq!(handle.status(), HandleStatus::Failed);
        let err = handle.try_result().unwrap().unwrap_err();
        assert_eq!(err.failure().unwrap().to_string(), "bad input");
    }

    #[tokio::test]
    async fn test_invoke_contains_panic() {
        let (handle, resolver) = pair::<u8>(1);
        let item = WorkItem::new(1, explode, resolver);

        item.invoke().await;

        let err = handle.try_result().unwrap().unwrap_err();
        assert!(matches!(err, TaskError::Panicked(m) if m == "worker must survive this"));
    }

    #[test]
    fn test_cancel_without_running() {
        let (handle, resolver) = pair::<u8>(1);
        let item = WorkItem::new(1, || async { Ok::<_, anyhow::Error>(7) }, resolver);

        item.cancel();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropping_in_flight_invocation_cancels() {
        let (handle, resolver) = pair::<u8>(1);
        let item = WorkItem::new(
            1,
            || async {
                std::future::pending::<()>().await;
                Ok::<_, anyhow::Error>(0)
            },
            resolver,
        );

        let mut running = tokio_test::task::spawn(item.invoke());
        tokio_test::assert_pending!(running.poll());
        drop(running);

        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_is_cancelled_reflects_caller_cancel() {
        let (handle, resolver) = pair::<u8>(1);
        let item = WorkItem::new(1, || async { Ok::<_, anyhow::Error>(1) }, resolver);

        assert!(!item.is_cancelled());
        handle.cancel();
        assert!(item.is_cancelled());
    }
}
