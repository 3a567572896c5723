//! # Prometheus Task Scheduler
//!
//! An in-process priority task scheduler for async workloads.
//!
//! Tasks are asynchronous units of work submitted with a name and options.
//! The scheduler runs the most urgent eligible task first and never runs more
//! than a configured number at once. Around that core it provides:
//!
//! - **Priorities**: lower numbers run first; ties run in submission order
//! - **Delays**: a pure wait before the first attempt
//! - **Retries**: a bounded number of extra attempts after a fixed backoff
//! - **Timeouts**: every attempt races a timer; losing work is dropped
//! - **Dependencies**: a task runs only after every task it depends on has
//!   completed, and fails fast when a dependency never will
//! - **Lifecycle events**: handlers subscribe to `taskAdded`, `taskStarted`,
//!   `taskRetrying`, `taskCompleted`, `taskFailed`, `taskCancelled` and
//!   `allTasksCompleted`
//! - **Stats**: totals, average duration and success rate
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use prometheus_task_scheduler::{EventKind, SchedulerBuilder, SchedulerEvent, TaskOptions};
//!
//! let scheduler = SchedulerBuilder::new()
//!     .max_concurrent(2)
//!     .default_timeout(Duration::from_secs(2))
//!     .build::<String>()?;
//!
//! scheduler.subscribe(EventKind::TaskCompleted, |event| {
//!     if let SchedulerEvent::TaskCompleted { task, result } = event {
//!         println!("{} -> {result}", task.name);
//!     }
//! });
//!
//! let fetch = scheduler.add_task(
//!     "fetch-user",
//!     || async { Ok("user".to_string()) },
//!     TaskOptions::new().with_priority(1).with_retries(2),
//! );
//! scheduler.add_task(
//!     "send-email",
//!     || async { Ok("sent".to_string()) },
//!     TaskOptions::new().with_dependencies([fetch]),
//! );
//!
//! let stats = scheduler.wait_for_completion().await;
//! assert_eq!(stats.completed_tasks, 2);
//! ```
//!
//! For complete scenarios, see:
//! - `tests/scheduler_test.rs` - scheduling, concurrency and stats
//! - `tests/dependency_test.rs` - dependency gating and failure propagation
//! - `src/bin/scheduler_demo.rs` - runnable walkthrough

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: tasks, events, notifier and scheduler.
pub mod core;
/// Configuration model and environment loading.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Data structures backing the scheduler.
pub mod infra;
/// Runtime adapters used to launch task executions.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::builders::{build_scheduler, SchedulerBuilder};
pub use crate::config::SchedulerConfig;
pub use crate::core::{
    attach_audit, EventBus, EventKind, Scheduler, SchedulerError, SchedulerEvent, SchedulerStats,
    TaskError, TaskId, TaskOptions, TaskSnapshot, TaskSpec, TaskStatus, TaskWork,
};
pub use crate::infra::PriorityQueue;
pub use crate::runtime::TokioSpawner;
