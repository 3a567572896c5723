//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use prometheus_task_scheduler::core::{Event, TaskOutput};
use prometheus_task_scheduler::{EventKind, Scheduler, SchedulerBuilder, TaskId};

/// Ordered log of `(kind, task)` pairs observed on a scheduler.
pub type EventLog = Arc<Mutex<Vec<(EventKind, Option<TaskId>)>>>;

/// Subscribe to every event kind and record deliveries in order.
pub fn record_events<T: TaskOutput>(scheduler: &Scheduler<T>) -> EventLog {
    let log: EventLog = Arc::default();
    for kind in EventKind::ALL {
        let log = Arc::clone(&log);
        scheduler.subscribe(kind, move |event| {
            log.lock().push((event.kind(), event.task().map(|t| t.id)));
        });
    }
    log
}

/// Index of the first `(kind, id)` entry in the log.
pub fn position(log: &EventLog, kind: EventKind, id: TaskId) -> Option<usize> {
    log.lock().iter().position(|entry| *entry == (kind, Some(id)))
}

/// Task ids in the order they were started.
pub fn start_order(log: &EventLog) -> Vec<TaskId> {
    log.lock()
        .iter()
        .filter(|(kind, _)| *kind == EventKind::TaskStarted)
        .filter_map(|(_, id)| *id)
        .collect()
}

/// Count entries of `kind`.
pub fn count(log: &EventLog, kind: EventKind) -> usize {
    log.lock().iter().filter(|(k, _)| *k == kind).count()
}

/// Scheduler with a concurrency limit and a short retry backoff.
pub fn scheduler<T: TaskOutput>(max_concurrent: usize) -> Scheduler<T> {
    SchedulerBuilder::new()
        .max_concurrent(max_concurrent)
        .retry_backoff(Duration::from_millis(100))
        .build()
        .expect("scheduler")
}
