//! The executor collaborator: where lifecycle callbacks and event dispatch
//! actually run.
//!
//! Follows the native-async-fn-plus-boxed-wrapper split the teacher uses
//! for `SpanExporter`/`SpanExporterBoxed` and `RateLimiter`/
//! `RateLimiterBoxed`: [`Executor`] is the ergonomic trait implementers
//! write against, [`ExecutorBoxed`] is the object-safe form the pipeline
//! actually stores as `Arc<dyn ExecutorBoxed>`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A unit of work submitted to an [`Executor`]. Synchronous by design:
/// lifecycle callbacks and event dispatch are synchronous Rust calls: only
/// *where* they run is asynchronous.
pub type BoxedTask = Box<dyn FnOnce() + Send>;

/// The executor backing a context has shut down and can no longer accept
/// work.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorShutDown;

impl fmt::Display for ExecutorShutDown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("executor has shut down")
    }
}

impl std::error::Error for ExecutorShutDown {}

/// Where a pipeline context's callbacks and event dispatch run.
pub trait Executor: Send + Sync {
    /// `true` if the calling thread is already running on this executor
    /// (so dispatch can run inline instead of enqueuing).
    fn in_event_loop(&self) -> bool;

    /// Runs `task` on this executor and resolves once it completes.
    fn submit(&self, task: BoxedTask) -> impl Future<Output = Result<(), ExecutorShutDown>> + Send;

    /// Runs `task` on this executor without waiting for completion.
    fn execute(&self, task: BoxedTask);
}

/// Object-safe counterpart of [`Executor`] for `dyn` storage.
pub trait ExecutorBoxed: Send + Sync {
    fn in_event_loop(&self) -> bool;
    fn submit_boxed(&self, task: BoxedTask) -> Pin<Box<dyn Future<Output = Result<(), ExecutorShutDown>> + Send>>;
    fn execute(&self, task: BoxedTask);
}

impl<T: Executor> ExecutorBoxed for T {
    fn in_event_loop(&self) -> bool {
        Executor::in_event_loop(self)
    }

    fn submit_boxed(&self, task: BoxedTask) -> Pin<Box<dyn Future<Output = Result<(), ExecutorShutDown>> + Send>> {
        Box::pin(self.submit(task))
    }

    fn execute(&self, task: BoxedTask) {
        Executor::execute(self, task);
    }
}

/// A thin wrapper over a `tokio::runtime::Handle`.
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

impl TokioExecutor {
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Binds to the handle of the runtime the caller is currently inside.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime context.
    #[must_use]
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }
}

impl Executor for TokioExecutor {
    fn in_event_loop(&self) -> bool {
        tokio::runtime::Handle::try_current()
            .map(|current| current.id() == self.handle.id())
            .unwrap_or(false)
    }

    fn submit(&self, task: BoxedTask) -> impl Future<Output = Result<(), ExecutorShutDown>> + Send {
        let handle = self.handle.clone();
        async move {
            let join = handle.spawn(async move { task() });
            join.await.map_err(|_| ExecutorShutDown)
        }
    }

    fn execute(&self, task: BoxedTask) {
        self.handle.spawn(async move { task() });
    }
}

/// Round-robins task submission over a fixed pool of executors, the same
/// shape `SenderFactory` uses to round-robin registrations over rings in
/// the sibling streaming crate.
pub struct ExecutorGroup {
    executors: Vec<Arc<dyn ExecutorBoxed>>,
    next: AtomicUsize,
}

impl ExecutorGroup {
    /// # Panics
    ///
    /// Panics if `executors` is empty.
    #[must_use]
    pub fn new(executors: Vec<Arc<dyn ExecutorBoxed>>) -> Self {
        assert!(!executors.is_empty(), "ExecutorGroup requires at least one executor");
        Self {
            executors,
            next: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn next(&self) -> Arc<dyn ExecutorBoxed> {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.executors.len();
        Arc::clone(&self.executors[i])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingExecutor {
        ran: std::sync::atomic::AtomicUsize,
    }

    impl Executor for CountingExecutor {
        fn in_event_loop(&self) -> bool {
            false
        }

        fn submit(&self, task: BoxedTask) -> impl Future<Output = Result<(), ExecutorShutDown>> + Send {
            self.ran.fetch_add(1, Ordering::Relaxed);
            task();
            async { Ok(()) }
        }

        fn execute(&self, task: BoxedTask) {
            self.ran.fetch_add(1, Ordering::Relaxed);
            task();
        }
    }

    #[test]
    fn group_round_robins() {
        let a: Arc<dyn ExecutorBoxed> = Arc::new(CountingExecutor { ran: AtomicUsize::new(0) });
        let b: Arc<dyn ExecutorBoxed> = Arc::new(CountingExecutor { ran: AtomicUsize::new(0) });
        let group = ExecutorGroup::new(vec![Arc::clone(&a), Arc::clone(&b)]);
        assert!(Arc::ptr_eq(&group.next(), &a));
        assert!(Arc::ptr_eq(&group.next(), &b));
        assert!(Arc::ptr_eq(&group.next(), &a));
    }

    #[tokio::test]
    async fn tokio_executor_runs_submitted_task() {
        let exec = TokioExecutor::current();
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        exec.submit(Box::new(move || flag.store(true, Ordering::SeqCst))).await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }
}
