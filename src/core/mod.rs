//! Core scheduling abstractions: tasks, events, the notifier and the scheduler.

pub mod audit;
pub mod error;
pub mod events;
pub mod executor;
pub mod notifier;
pub mod scheduler;
pub mod stats;
pub mod task;

pub use audit::{attach_audit, build_audit_event, AuditEvent, AuditSink, InMemoryAuditSink};
pub use error::{AppResult, DependencyProblem, SchedulerError, TaskError};
pub use events::{EventKind, SchedulerEvent};
pub use executor::{FnWork, TaskOutput, TaskWork};
pub use notifier::{Event, EventBus, Handler, Subscription, SubscriptionId};
pub use scheduler::{BoxedTask, Scheduler, Spawn};
pub use stats::SchedulerStats;
pub use task::{TaskId, TaskOptions, TaskSnapshot, TaskSpec, TaskStatus};
