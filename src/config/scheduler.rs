//! Scheduler configuration structures.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable overriding [`SchedulerConfig::max_concurrent`].
pub const ENV_MAX_CONCURRENT: &str = "TASK_SCHEDULER_MAX_CONCURRENT";
/// Environment variable overriding [`SchedulerConfig::default_timeout_ms`].
pub const ENV_DEFAULT_TIMEOUT_MS: &str = "TASK_SCHEDULER_DEFAULT_TIMEOUT_MS";
/// Environment variable overriding [`SchedulerConfig::retry_backoff_ms`].
pub const ENV_RETRY_BACKOFF_MS: &str = "TASK_SCHEDULER_RETRY_BACKOFF_MS";

const DEFAULT_MAX_CONCURRENT: usize = 3;
const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 1_000;

/// Root scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum tasks occupying a concurrency slot at once.
    pub max_concurrent: usize,
    /// Per-attempt timeout for tasks that do not set one.
    pub default_timeout_ms: u64,
    /// Fixed wait between a failed attempt and the next one.
    pub retry_backoff_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl SchedulerConfig {
    /// Default timeout as a [`Duration`].
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Retry backoff as a [`Duration`].
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent == 0 {
            return Err("max_concurrent must be greater than 0".into());
        }
        if self.default_timeout_ms == 0 {
            return Err("default_timeout_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from defaults overridden by environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from defaults overridden by `lookup(key)`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup(ENV_MAX_CONCURRENT) {
            cfg.max_concurrent = parse_var(ENV_MAX_CONCURRENT, &v)?;
        }
        if let Some(v) = lookup(ENV_DEFAULT_TIMEOUT_MS) {
            cfg.default_timeout_ms = parse_var(ENV_DEFAULT_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_RETRY_BACKOFF_MS) {
            cfg.retry_backoff_ms = parse_var(ENV_RETRY_BACKOFF_MS, &v)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_var<N: std::str::FromStr>(key: &str, value: &str) -> Result<N, String>
where
    N::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("{key}=`{value}` is invalid: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.max_concurrent, 3);
        assert_eq!(cfg.default_timeout(), Duration::from_millis(5_000));
        assert_eq!(cfg.retry_backoff(), Duration::from_millis(1_000));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_MAX_CONCURRENT, "8"),
            (ENV_RETRY_BACKOFF_MS, " 50 "),
        ]
        .into_iter()
        .collect();
        let cfg = SchedulerConfig::from_lookup(|k| vars.get(k).map(ToString::to_string)).unwrap();
        assert_eq!(cfg.max_concurrent, 8);
        assert_eq!(cfg.default_timeout_ms, 5_000);
        assert_eq!(cfg.retry_backoff_ms, 50);
    }

    #[test]
    fn test_lookup_rejects_garbage() {
        let err = SchedulerConfig::from_lookup(|k| {
            (k == ENV_MAX_CONCURRENT).then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(err.contains(ENV_MAX_CONCURRENT));
    }
}
