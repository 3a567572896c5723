//! Configuration models for concurrency, timeouts, and retry backoff.

pub mod scheduler;

pub use scheduler::SchedulerConfig;
