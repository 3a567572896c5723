//! Task identity, options, lifecycle status, and snapshots.

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::{FnWork, TaskError, TaskWork};

/// Identifier assigned to a task when it is submitted.
///
/// Ids are handed out in increasing order by the scheduler that owns the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    /// Wrap a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Status of a task in the scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted, waiting for dependencies or a concurrency slot.
    Pending,
    /// Dispatched; delay or an attempt is in progress.
    Running,
    /// An attempt failed and the task is backing off before the next one.
    Retrying,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
    /// Cancelled before it was dispatched.
    Cancelled,
}

impl TaskStatus {
    /// Whether no further transitions can happen.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// `Pending -> Failed` is only taken when a dependency can never complete.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Cancelled | Self::Failed)
                | (Self::Running, Self::Completed | Self::Retrying | Self::Failed)
                | (Self::Retrying, Self::Running)
        )
    }

    /// Lowercase label used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling options supplied with a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskOptions {
    /// Queue priority; lower values are dispatched first.
    pub priority: i32,
    /// Wait between dispatch and the first attempt.
    pub delay: Duration,
    /// Extra attempts allowed after the first one fails.
    pub retries: u32,
    /// Budget for a single attempt. `None` (or zero) uses the scheduler default.
    pub timeout: Option<Duration>,
    /// Tasks that must complete before this one becomes eligible.
    pub dependencies: Vec<TaskId>,
}

impl TaskOptions {
    /// Options with every field at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the pre-execution delay.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the retry budget.
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the dependencies.
    #[must_use]
    pub fn with_dependencies<I>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = TaskId>,
    {
        self.dependencies = dependencies.into_iter().collect();
        self
    }
}

/// A task description for bulk submission.
pub struct TaskSpec<T> {
    /// Display name.
    pub name: String,
    /// Work run on each attempt.
    pub work: Arc<dyn TaskWork<T>>,
    /// Scheduling options.
    pub options: TaskOptions,
}

impl<T: Send + 'static> TaskSpec<T> {
    /// Build a spec from a closure returning a future.
    pub fn new<F, Fut>(name: impl Into<String>, work: F, options: TaskOptions) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            name: name.into(),
            work: Arc::new(FnWork::new(work)),
            options,
        }
    }

    /// Build a spec from an existing [`TaskWork`] implementation.
    pub fn from_work(name: impl Into<String>, work: Arc<dyn TaskWork<T>>, options: TaskOptions) -> Self {
        Self {
            name: name.into(),
            work,
            options,
        }
    }
}

impl<T> fmt::Debug for TaskSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpec")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Point-in-time copy of a task, returned by queries and carried by events.
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot<T> {
    /// Task id.
    pub id: TaskId,
    /// Display name.
    pub name: String,
    /// Queue priority.
    pub priority: i32,
    /// Pre-execution delay.
    pub delay: Duration,
    /// Retry budget at submission.
    pub max_retries: u32,
    /// Retries not yet used.
    pub retries_remaining: u32,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Declared dependencies.
    pub dependencies: Vec<TaskId>,
    /// Current status.
    pub status: TaskStatus,
    /// Result of the successful attempt.
    pub result: Option<T>,
    /// Failure reason once failed.
    pub error: Option<TaskError>,
    /// Attempts started so far.
    pub attempts: u32,
    /// Submission time in milliseconds since epoch.
    pub created_at_ms: u128,
    /// Time from the first attempt to the terminal state.
    pub duration: Option<Duration>,
}

/// Scheduler-owned mutable state of one task.
pub(crate) struct TaskRecord<T> {
    pub(crate) id: TaskId,
    pub(crate) name: String,
    pub(crate) work: Arc<dyn TaskWork<T>>,
    pub(crate) priority: i32,
    pub(crate) delay: Duration,
    pub(crate) max_retries: u32,
    pub(crate) retries_remaining: u32,
    pub(crate) timeout: Duration,
    pub(crate) dependencies: Vec<TaskId>,
    pub(crate) status: TaskStatus,
    pub(crate) result: Option<T>,
    pub(crate) error: Option<TaskError>,
    pub(crate) attempts: u32,
    pub(crate) created_at_ms: u128,
    pub(crate) started_at: Option<Instant>,
    pub(crate) finished_at: Option<Instant>,
}

impl<T: Clone> TaskRecord<T> {
    pub(crate) fn new(
        id: TaskId,
        name: String,
        work: Arc<dyn TaskWork<T>>,
        options: TaskOptions,
        default_timeout: Duration,
    ) -> Self {
        let timeout = options
            .timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(default_timeout);
        // Deduplicate while keeping first-seen order.
        let mut seen = BTreeSet::new();
        let dependencies = options
            .dependencies
            .into_iter()
            .filter(|dep| seen.insert(*dep))
            .collect();

        Self {
            id,
            name,
            work,
            priority: options.priority,
            delay: options.delay,
            max_retries: options.retries,
            retries_remaining: options.retries,
            timeout,
            dependencies,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            attempts: 0,
            created_at_ms: crate::util::clock::now_ms(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Move to `next` if the lifecycle allows it.
    pub(crate) fn transition(&mut self, next: TaskStatus) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::warn!(
                task_id = %self.id,
                from = %self.status,
                to = %next,
                "rejected invalid task status transition"
            );
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Instant::now());
        }
        true
    }

    pub(crate) fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(end.saturating_duration_since(start)),
            _ => None,
        }
    }

    pub(crate) fn snapshot(&self) -> TaskSnapshot<T> {
        TaskSnapshot {
            id: self.id,
            name: self.name.clone(),
            priority: self.priority,
            delay: self.delay,
            max_retries: self.max_retries,
            retries_remaining: self.retries_remaining,
            timeout: self.timeout,
            dependencies: self.dependencies.clone(),
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
            attempts: self.attempts,
            created_at_ms: self.created_at_ms,
            duration: self.duration(),
        }
    }
}
