//! Subscription behavior observed through a live scheduler.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::scheduler;
use prometheus_task_scheduler::{EventKind, SchedulerEvent, TaskOptions};

#[tokio::test]
async fn test_subscribe_once_fires_for_first_batch_only() {
    let scheduler = scheduler::<u8>(2);
    let drains = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&drains);
    scheduler.subscribe_once(EventKind::AllTasksCompleted, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    scheduler.add_task("one", || async { Ok(1) }, TaskOptions::new());
    scheduler.wait_for_completion().await;
    scheduler.add_task("two", || async { Ok(2) }, TaskOptions::new());
    scheduler.wait_for_completion().await;

    assert_eq!(drains.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let scheduler = scheduler::<u8>(1);
    let added = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&added);
    let subscription = scheduler.subscribe(EventKind::TaskAdded, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    scheduler.add_task("seen", || async { Ok(1) }, TaskOptions::new());
    assert!(scheduler.unsubscribe(subscription.kind(), subscription.id()));
    scheduler.add_task("unseen", || async { Ok(2) }, TaskOptions::new());
    scheduler.wait_for_completion().await;

    assert_eq!(added.load(Ordering::SeqCst), 1);
    assert!(!subscription.unsubscribe(), "already removed");
}

#[tokio::test]
async fn test_subscription_handle_unsubscribes() {
    let scheduler = scheduler::<u8>(1);
    let subscription = scheduler.subscribe(EventKind::TaskStarted, |_| {});
    assert_eq!(scheduler.events().handler_count(EventKind::TaskStarted), 1);
    assert!(subscription.unsubscribe());
    assert_eq!(scheduler.events().handler_count(EventKind::TaskStarted), 0);
}

#[tokio::test]
async fn test_handlers_only_see_their_kind() {
    let scheduler = scheduler::<u8>(1);
    let wrong = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&wrong);
    scheduler.subscribe(EventKind::TaskFailed, move |event| {
        if !matches!(event, SchedulerEvent::TaskFailed { .. }) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    scheduler.add_task("fine", || async { Ok(1) }, TaskOptions::new());
    scheduler.add_task("broken", || async { Err::<u8, _>(anyhow::anyhow!("x")) }, TaskOptions::new());
    let stats = scheduler.wait_for_completion().await;

    assert_eq!(stats.failed_tasks, 1);
    assert_eq!(wrong.load(Ordering::SeqCst), 0);
}
