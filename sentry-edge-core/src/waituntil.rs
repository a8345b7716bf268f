//! Keeping the host alive until background work is done.
//!
//! Edge runtimes may stop executing a request as soon as the response was
//! returned.  Work that has to outlive the response, such as flushing the
//! events of the request, has to be handed to the host's "wait until"
//! hook.  [`TaskTracker`] wraps that hook and doubles as a completion
//! barrier: a flush registered through it only runs once every other
//! registered task has settled.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::Client;

/// A boxed future handed to the host.
pub type BoxTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// The host's hook to keep the execution context alive until a task settled.
///
/// Any `Fn(BoxTask)` closure implements this trait, so that an executor can
/// be plugged in directly:
///
/// ```
/// use sentry_edge_core::{BoxTask, TaskTracker};
///
/// let tracker = TaskTracker::new(|task: BoxTask| {
///     drop(tokio::spawn(task));
/// });
/// ```
pub trait WaitUntil: Send + Sync + 'static {
    /// Keeps the execution context alive until `task` completed.
    fn wait_until(&self, task: BoxTask);
}

impl<F> WaitUntil for F
where
    F: Fn(BoxTask) + Send + Sync + 'static,
{
    fn wait_until(&self, task: BoxTask) {
        self(task)
    }
}

#[derive(Default)]
struct Barrier {
    pending: AtomicUsize,
    settled: Notify,
}

/// Decrements the pending count when the tracked task settles or is dropped.
struct PendingGuard(Arc<Barrier>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.0.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.settled.notify_waiters();
        }
    }
}

/// Counts outstanding tasks registered with the host.
#[derive(Clone)]
pub struct TaskTracker {
    host: Arc<dyn WaitUntil>,
    barrier: Arc<Barrier>,
}

impl fmt::Debug for TaskTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskTracker")
            .field("pending", &self.pending())
            .finish()
    }
}

impl TaskTracker {
    /// Wraps the host's wait-until hook.
    pub fn new<W: WaitUntil>(host: W) -> Self {
        Self {
            host: Arc::new(host),
            barrier: Default::default(),
        }
    }

    /// The number of registered tasks that did not settle yet.
    pub fn pending(&self) -> usize {
        self.barrier.pending.load(Ordering::Acquire)
    }

    /// Registers `task` with the host and the barrier.
    pub fn wait_until<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.barrier.pending.fetch_add(1, Ordering::AcqRel);
        let guard = PendingGuard(self.barrier.clone());
        self.host.wait_until(Box::pin(async move {
            let _guard = guard;
            task.await;
        }));
    }

    /// Resolves once every registered task has settled.
    ///
    /// Tasks registered while waiting are waited for as well.
    pub async fn wait(&self) {
        loop {
            let settled = self.barrier.settled.notified();
            tokio::pin!(settled);
            settled.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            settled.await;
        }
    }

    /// Registers a flush of `client` with the host.
    ///
    /// The flush waits for all other registered tasks first, so events they
    /// capture are part of it.  It is not counted by the barrier itself.
    pub fn flush_when_done(&self, client: Arc<Client>, timeout: Option<Duration>) {
        let tracker = self.clone();
        self.host.wait_until(Box::pin(async move {
            tracker.wait().await;
            flush_client(client, timeout).await;
        }));
    }
}

/// Flushes the client without blocking the async runtime, if there is one.
async fn flush_client(client: Arc<Client>, timeout: Option<Duration>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            let flushed = handle
                .spawn_blocking(move || client.flush(timeout))
                .await
                .unwrap_or(false);
            if !flushed {
                sentry_debug!("[TaskTracker] flush did not complete");
            }
        }
        Err(_) => {
            client.flush(timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Clone, Default)]
    struct CollectingHost(Arc<Mutex<Vec<BoxTask>>>);

    impl WaitUntil for CollectingHost {
        fn wait_until(&self, task: BoxTask) {
            self.0.lock().unwrap().push(task);
        }
    }

    impl CollectingHost {
        fn take(&self) -> Vec<BoxTask> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    #[tokio::test]
    async fn test_wait_resolves_when_all_tasks_settled() {
        let host = CollectingHost::default();
        let tracker = TaskTracker::new(host.clone());
        tracker.wait().await;

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tracker.wait_until(async move {
            let _ = rx.await;
        });
        tracker.wait_until(async {});
        assert_eq!(tracker.pending(), 2);

        let handles: Vec<_> = host.take().into_iter().map(tokio::spawn).collect();
        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        tx.send(()).unwrap();
        waiter.await.unwrap();
        assert_eq!(tracker.pending(), 0);
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_dropped_task_settles() {
        let host = CollectingHost::default();
        let tracker = TaskTracker::new(host.clone());
        tracker.wait_until(std::future::pending());
        assert_eq!(tracker.pending(), 1);
        drop(host.take());
        assert_eq!(tracker.pending(), 0);
        tracker.wait().await;
    }

    #[tokio::test]
    async fn test_closure_host() {
        let tracker = TaskTracker::new(|task: BoxTask| {
            drop(tokio::spawn(task));
        });
        let (tx, rx) = tokio::sync::oneshot::channel();
        tracker.wait_until(async move {
            tx.send(42).unwrap();
        });
        tracker.wait().await;
        assert_eq!(rx.await.unwrap(), 42);
    }
}
