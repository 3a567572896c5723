//! Audit trail of scheduler lifecycle events.
//!
//! [`attach_audit`] subscribes a sink to every event kind so each state
//! change is recorded as an [`AuditEvent`].

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{EventKind, Scheduler, SchedulerEvent, Subscription, TaskId, TaskOutput};
use crate::util::clock::now_ms;

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event identifier.
    pub event_id: String,
    /// Related task, absent for scheduler-wide events.
    pub task_id: Option<TaskId>,
    /// Related task name.
    pub task_name: Option<String>,
    /// Action taken (`taskAdded`, `taskStarted`, ...).
    pub action: String,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context such as an error message or stats summary.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink keeping the most recent `max_events` records.
#[derive(Debug)]
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Build an audit record for a scheduler event.
pub fn build_audit_event<T>(event: &SchedulerEvent<T>) -> AuditEvent
where
    T: Send + Sync + 'static,
{
    use crate::core::notifier::Event;

    let detail = match event {
        SchedulerEvent::TaskRetrying { task, error } => Some(format!(
            "{error} ({} retries left)",
            task.retries_remaining
        )),
        SchedulerEvent::TaskFailed { error, .. } => Some(error.to_string()),
        SchedulerEvent::AllTasksCompleted(stats) => serde_json::to_string(stats).ok(),
        _ => None,
    };
    let task = event.task();

    AuditEvent {
        event_id: Uuid::new_v4().to_string(),
        task_id: task.map(|t| t.id),
        task_name: task.map(|t| t.name.clone()),
        action: event.kind().as_str().to_string(),
        created_at_ms: now_ms(),
        detail,
    }
}

/// Record every lifecycle event of `scheduler` into `sink`.
///
/// Returns the subscriptions so the caller can detach the sink later.
pub fn attach_audit<T, S>(
    scheduler: &Scheduler<T>,
    sink: Arc<Mutex<S>>,
) -> Vec<Subscription<SchedulerEvent<T>>>
where
    T: TaskOutput,
    S: AuditSink + 'static,
{
    EventKind::ALL
        .iter()
        .map(|&kind| {
            let sink = Arc::clone(&sink);
            scheduler.subscribe(kind, move |event| sink.lock().record(build_audit_event(event)))
        })
        .collect()
}
