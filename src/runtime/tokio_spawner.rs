//! Tokio runtime spawner implementation.

use std::sync::Arc;

use tokio::runtime::{Handle, Runtime};
use tracing::debug;

use crate::core::{BoxedTask, SchedulerError, Spawn};

/// Tokio-based spawner that executes task attempts on a tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioSpawner {
    handle: Handle,
    /// Keeps a runtime built by [`TokioSpawner::with_worker_threads`] alive.
    _runtime: Option<Arc<OwnedRuntime>>,
}

/// Runtime owned by a spawner.
///
/// Running executions hold the scheduler, and through it the spawner, so the
/// last reference is often released on one of this runtime's own workers.
/// Shutdown therefore never waits for worker threads.
#[derive(Debug)]
struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            debug!("shutting down owned scheduler runtime");
            runtime.shutdown_background();
        }
    }
}

impl TokioSpawner {
    /// Create a spawner from a tokio runtime handle.
    pub const fn new(handle: Handle) -> Self {
        Self {
            handle,
            _runtime: None,
        }
    }

    /// Spawner for the runtime the caller is running in.
    pub fn current() -> Result<Self, SchedulerError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| SchedulerError::Runtime(e.to_string()))
    }

    /// Create a spawner that owns a new multi-threaded runtime with
    /// `worker_threads` workers.
    ///
    /// The runtime shuts down in the background when the last clone is
    /// dropped, including when that happens on one of its own workers.
    pub fn with_worker_threads(worker_threads: usize) -> Result<Self, SchedulerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("task-scheduler-worker")
            .enable_all()
            .build()
            .map_err(|e| SchedulerError::Runtime(e.to_string()))?;
        Ok(Self {
            handle: runtime.handle().clone(),
            _runtime: Some(Arc::new(OwnedRuntime(Some(runtime)))),
        })
    }

    /// Handle of the runtime tasks are spawned on.
    pub const fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl Spawn for TokioSpawner {
    fn spawn(&self, fut: BoxedTask) {
        self.handle.spawn(fut);
    }
}
