//! Walkthrough of the scheduler: priorities, retries, dependencies, delays
//! and lifecycle events.
//!
//! Run with `RUST_LOG=debug cargo run --bin scheduler-demo` to see dispatch
//! decisions. Settings come from `TASK_SCHEDULER_*` environment variables
//! (or a `.env` file) on top of a concurrency limit of 2.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::{json, Value};
use tracing::info;

use prometheus_task_scheduler::config::scheduler::ENV_MAX_CONCURRENT;
use prometheus_task_scheduler::core::AppResult;
use prometheus_task_scheduler::util::init_tracing;
use prometheus_task_scheduler::{
    EventKind, SchedulerBuilder, SchedulerConfig, SchedulerEvent, TaskOptions, TaskSpec,
};

#[tokio::main]
async fn main() -> AppResult<()> {
    init_tracing();

    let mut config = SchedulerConfig::from_env()
        .map_err(anyhow::Error::msg)
        .context("loading scheduler configuration")?;
    if std::env::var_os(ENV_MAX_CONCURRENT).is_none() {
        config.max_concurrent = 2;
    }
    let scheduler = SchedulerBuilder::from_config(config).build::<Value>()?;

    scheduler.subscribe(EventKind::TaskCompleted, |event| {
        if let SchedulerEvent::TaskCompleted { task, result } = event {
            let ms = task.duration.map_or(0, |d| d.as_millis());
            info!(task = %task.name, duration_ms = %ms, %result, "completed");
        }
    });
    scheduler.subscribe(EventKind::TaskRetrying, |event| {
        if let SchedulerEvent::TaskRetrying { task, error } = event {
            info!(task = %task.name, retries_left = task.retries_remaining, %error, "retrying");
        }
    });
    scheduler.subscribe(EventKind::TaskFailed, |event| {
        if let SchedulerEvent::TaskFailed { task, error } = event {
            info!(task = %task.name, %error, "failed");
        }
    });

    let fetch = scheduler.add_task(
        "Fetch User Data",
        || async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(json!({ "id": 1, "name": "Alice" }))
        },
        TaskOptions::new().with_priority(1),
    );

    let analytics = scheduler.add_task(
        "Process Analytics",
        || async {
            tokio::time::sleep(Duration::from_millis(800)).await;
            Ok(json!({ "views": 1000, "clicks": 50 }))
        },
        TaskOptions::new().with_priority(2).with_retries(2),
    );

    scheduler.add_task(
        "Generate Report",
        || async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(json!("Report Generated"))
        },
        TaskOptions::new()
            .with_priority(3)
            .with_dependencies([fetch, analytics]),
    );

    // Fails its first two attempts, then succeeds on the third.
    let attempts = Arc::new(AtomicU32::new(0));
    scheduler.add_task(
        "Flaky Task",
        move || {
            let attempts = Arc::clone(&attempts);
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    anyhow::bail!("transient failure");
                }
                Ok::<_, anyhow::Error>(json!("Success"))
            }
        },
        TaskOptions::new()
            .with_retries(3)
            .with_timeout(Duration::from_secs(2)),
    );

    scheduler.add_bulk_tasks([
        TaskSpec::new(
            "Task A",
            || async { Ok(json!("A done")) },
            TaskOptions::new().with_delay(Duration::from_millis(200)),
        ),
        TaskSpec::new(
            "Task B",
            || async { Ok(json!("B done")) },
            TaskOptions::new().with_delay(Duration::from_millis(150)),
        ),
        TaskSpec::new(
            "Task C",
            || async { Ok(json!("C done")) },
            TaskOptions::new().with_delay(Duration::from_millis(100)),
        ),
    ]);

    let stats = scheduler.wait_for_completion().await;
    println!("\n=== Scheduler Stats ===");
    println!("Total: {}", stats.total_tasks);
    println!("Completed: {}", stats.completed_tasks);
    println!("Failed: {}", stats.failed_tasks);
    println!("Cancelled: {}", stats.cancelled_tasks);
    println!("Success Rate: {:.2}%", stats.success_rate);
    println!("Average Duration: {:.2}ms", stats.average_duration_ms);
    Ok(())
}
