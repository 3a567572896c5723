//! Lifecycle events published by the scheduler.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::notifier::Event;
use crate::core::{SchedulerStats, TaskError, TaskSnapshot};

/// Event names a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// A task was submitted.
    TaskAdded,
    /// A task was dispatched into a concurrency slot.
    TaskStarted,
    /// An attempt failed and the task will try again.
    TaskRetrying,
    /// A task finished successfully.
    TaskCompleted,
    /// A task finished unsuccessfully.
    TaskFailed,
    /// A pending task was cancelled.
    TaskCancelled,
    /// The queue drained and nothing is running.
    AllTasksCompleted,
}

impl EventKind {
    /// Every kind, in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::TaskAdded,
        Self::TaskStarted,
        Self::TaskRetrying,
        Self::TaskCompleted,
        Self::TaskFailed,
        Self::TaskCancelled,
        Self::AllTasksCompleted,
    ];

    /// Event name as used by hosting layers.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskAdded => "taskAdded",
            Self::TaskStarted => "taskStarted",
            Self::TaskRetrying => "taskRetrying",
            Self::TaskCompleted => "taskCompleted",
            Self::TaskFailed => "taskFailed",
            Self::TaskCancelled => "taskCancelled",
            Self::AllTasksCompleted => "allTasksCompleted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduler lifecycle event with its payload.
#[derive(Debug, Clone)]
pub enum SchedulerEvent<T> {
    /// A task was submitted.
    TaskAdded(TaskSnapshot<T>),
    /// A task was dispatched.
    TaskStarted(TaskSnapshot<T>),
    /// An attempt failed; another will follow after the backoff.
    TaskRetrying {
        /// Task state after the budget was decremented.
        task: TaskSnapshot<T>,
        /// Why the attempt failed.
        error: TaskError,
    },
    /// A task finished successfully.
    TaskCompleted {
        /// Final task state.
        task: TaskSnapshot<T>,
        /// Value produced by the work.
        result: T,
    },
    /// A task finished unsuccessfully.
    TaskFailed {
        /// Final task state.
        task: TaskSnapshot<T>,
        /// Failure reason.
        error: TaskError,
    },
    /// A pending task was cancelled.
    TaskCancelled(TaskSnapshot<T>),
    /// The scheduler went idle.
    AllTasksCompleted(SchedulerStats),
}

impl<T> SchedulerEvent<T> {
    /// The task this event is about, if any.
    pub fn task(&self) -> Option<&TaskSnapshot<T>> {
        match self {
            Self::TaskAdded(task)
            | Self::TaskStarted(task)
            | Self::TaskCancelled(task)
            | Self::TaskRetrying { task, .. }
            | Self::TaskCompleted { task, .. }
            | Self::TaskFailed { task, .. } => Some(task),
            Self::AllTasksCompleted(_) => None,
        }
    }
}

impl<T: Send + Sync + 'static> Event for SchedulerEvent<T> {
    type Kind = EventKind;

    fn kind(&self) -> EventKind {
        match self {
            Self::TaskAdded(_) => EventKind::TaskAdded,
            Self::TaskStarted(_) => EventKind::TaskStarted,
            Self::TaskRetrying { .. } => EventKind::TaskRetrying,
            Self::TaskCompleted { .. } => EventKind::TaskCompleted,
            Self::TaskFailed { .. } => EventKind::TaskFailed,
            Self::TaskCancelled(_) => EventKind::TaskCancelled,
            Self::AllTasksCompleted(_) => EventKind::AllTasksCompleted,
        }
    }
}
