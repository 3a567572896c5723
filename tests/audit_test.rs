//! Audit trail capture.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::scheduler;
use parking_lot::Mutex;
use prometheus_task_scheduler::core::{AuditSink, InMemoryAuditSink};
use prometheus_task_scheduler::{attach_audit, TaskId, TaskOptions};

#[test]
fn test_in_memory_sink_is_bounded() {
    let mut sink = InMemoryAuditSink::new(2);
    for i in 0..3_u64 {
        sink.record(prometheus_task_scheduler::core::AuditEvent {
            event_id: format!("evt{i}"),
            task_id: Some(TaskId::new(i)),
            task_name: None,
            action: "taskAdded".into(),
            created_at_ms: 0,
            detail: None,
        });
    }
    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_id, "evt1");
    assert_eq!(events[1].event_id, "evt2");
}

#[tokio::test]
async fn test_attach_audit_records_lifecycle() {
    let scheduler = scheduler::<u8>(1);
    let sink = Arc::new(Mutex::new(InMemoryAuditSink::new(64)));
    let subscriptions = attach_audit(&scheduler, Arc::clone(&sink));
    assert_eq!(subscriptions.len(), 7);

    let ok = scheduler.add_task("ok", || async { Ok(1) }, TaskOptions::new());
    let bad = scheduler.add_task("bad", || async { Err::<u8, _>(anyhow::anyhow!("nope")) }, TaskOptions::new());
    scheduler.wait_for_completion().await;

    let events = sink.lock().events();
    let trail: Vec<(Option<TaskId>, &str)> =
        events.iter().map(|e| (e.task_id, e.action.as_str())).collect();
    assert!(trail.contains(&(Some(ok), "taskCompleted")));
    assert!(trail.contains(&(Some(bad), "taskFailed")));
    assert_eq!(trail.last(), Some(&(None, "allTasksCompleted")));

    let failed = events.iter().find(|e| e.action == "taskFailed").unwrap();
    assert_eq!(failed.task_name.as_deref(), Some("bad"));
    assert_eq!(failed.detail.as_deref(), Some("task failed: nope"));
    assert!(events.last().unwrap().detail.as_deref().unwrap().contains("\"total_tasks\":2"));

    let ids: HashSet<_> = events.iter().map(|e| e.event_id.clone()).collect();
    assert_eq!(ids.len(), events.len());

    for subscription in subscriptions {
        assert!(subscription.unsubscribe());
    }
    scheduler.add_task("quiet", || async { Ok(3) }, TaskOptions::new());
    scheduler.wait_for_completion().await;
    assert_eq!(sink.lock().events().len(), events.len());
}
