//! Task work abstraction.

use std::future::Future;

use async_trait::async_trait;

/// Bound on values produced by task work.
pub trait TaskOutput: Clone + Send + Sync + 'static {}

/// Blanket implementation: any type meeting the requirements is a `TaskOutput`.
impl<T> TaskOutput for T where T: Clone + Send + Sync + 'static {}

/// The unit of work a task runs on each attempt.
///
/// Work is invoked once per execution attempt, so a task with retries calls
/// `run` several times. Returning `Err` (or panicking) fails the attempt.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_task_scheduler::core::TaskWork;
///
/// struct ReadManifest {
///     path: std::path::PathBuf,
/// }
///
/// #[async_trait]
/// impl TaskWork<String> for ReadManifest {
///     async fn run(&self) -> anyhow::Result<String> {
///         Ok(tokio::fs::read_to_string(&self.path).await?)
///     }
/// }
/// ```
#[async_trait]
pub trait TaskWork<T>: Send + Sync + 'static {
    /// Run one attempt of the work.
    async fn run(&self) -> anyhow::Result<T>;
}

/// Adapter turning a closure that returns a future into [`TaskWork`].
pub struct FnWork<F> {
    f: F,
}

impl<F> FnWork<F> {
    /// Wrap a closure.
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<T, F, Fut> TaskWork<T> for FnWork<F>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    async fn run(&self) -> anyhow::Result<T> {
        (self.f)().await
    }
}
