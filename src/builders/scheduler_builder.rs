//! Fluent scheduler construction.

use std::sync::Arc;
use std::time::Duration;

use crate::config::SchedulerConfig;
use crate::core::{Scheduler, SchedulerError, Spawn, TaskOutput};
use crate::util::clock::duration_ms;

/// Build a scheduler from configuration on the current tokio runtime.
pub fn build_scheduler<T: TaskOutput>(cfg: &SchedulerConfig) -> Result<Scheduler<T>, SchedulerError> {
    SchedulerBuilder::from_config(cfg.clone()).build()
}

/// Builder for [`Scheduler`].
///
/// Starts from [`SchedulerConfig::default`]; validation happens in
/// [`SchedulerBuilder::build`].
#[derive(Default)]
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    spawner: Option<Arc<dyn Spawn>>,
}

impl std::fmt::Debug for SchedulerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerBuilder")
            .field("config", &self.config)
            .field("custom_spawner", &self.spawner.is_some())
            .finish()
    }
}

impl SchedulerBuilder {
    /// Builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder starting from an existing configuration.
    pub fn from_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            spawner: None,
        }
    }

    /// Maximum concurrently running tasks.
    pub fn max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.config.max_concurrent = max_concurrent;
        self
    }

    /// Per-attempt timeout for tasks that do not set one.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout_ms = duration_ms(timeout);
        self
    }

    /// Wait between a failed attempt and its retry.
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry_backoff_ms = duration_ms(backoff);
        self
    }

    /// Launch executions through `spawner` instead of the current runtime.
    pub fn spawner(mut self, spawner: Arc<dyn Spawn>) -> Self {
        self.spawner = Some(spawner);
        self
    }

    /// Validate the configuration and create the scheduler.
    pub fn build<T: TaskOutput>(self) -> Result<Scheduler<T>, SchedulerError> {
        match self.spawner {
            Some(spawner) => Scheduler::with_spawner(self.config, spawner),
            None => Scheduler::new(self.config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builder_applies_settings() {
        let scheduler: Scheduler<()> = SchedulerBuilder::new()
            .max_concurrent(1)
            .default_timeout(Duration::from_millis(250))
            .retry_backoff(Duration::from_millis(10))
            .build()
            .unwrap();
        assert_eq!(scheduler.config().max_concurrent, 1);
        assert_eq!(scheduler.config().default_timeout_ms, 250);
        assert_eq!(scheduler.config().retry_backoff_ms, 10);
    }

    #[tokio::test]
    async fn test_builder_rejects_zero_concurrency() {
        let err = SchedulerBuilder::new().max_concurrent(0).build::<()>().unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfig(_)));
    }

    #[test]
    fn test_build_without_runtime_fails() {
        let err = build_scheduler::<()>(&SchedulerConfig::default()).unwrap_err();
        assert!(matches!(err, SchedulerError::Runtime(_)));
    }
}
