//! Aggregate scheduler statistics.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::clock::duration_ms;

/// Snapshot of aggregate counters, with derived averages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Tasks submitted.
    pub total_tasks: u64,
    /// Tasks that completed successfully.
    pub completed_tasks: u64,
    /// Tasks that failed, including dependency failures.
    pub failed_tasks: u64,
    /// Tasks cancelled before dispatch.
    pub cancelled_tasks: u64,
    /// Summed duration of completed tasks in milliseconds.
    pub total_duration_ms: u64,
    /// `total_duration_ms / completed_tasks`, or 0.
    pub average_duration_ms: f64,
    /// `completed_tasks / total_tasks * 100`, or 0.
    pub success_rate: f64,
}

/// Mutable counters owned by the scheduler state.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) total_tasks: u64,
    pub(crate) completed_tasks: u64,
    pub(crate) failed_tasks: u64,
    pub(crate) cancelled_tasks: u64,
    pub(crate) total_duration: Duration,
}

impl StatsCounters {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn snapshot(&self) -> SchedulerStats {
        let total_duration_ms = duration_ms(self.total_duration);
        let average_duration_ms = if self.completed_tasks > 0 {
            self.total_duration.as_secs_f64() * 1_000.0 / self.completed_tasks as f64
        } else {
            0.0
        };
        let success_rate = if self.total_tasks > 0 {
            self.completed_tasks as f64 / self.total_tasks as f64 * 100.0
        } else {
            0.0
        };

        SchedulerStats {
            total_tasks: self.total_tasks,
            completed_tasks: self.completed_tasks,
            failed_tasks: self.failed_tasks,
            cancelled_tasks: self.cancelled_tasks,
            total_duration_ms,
            average_duration_ms,
            success_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_has_zero_rates() {
        let stats = StatsCounters::default().snapshot();
        assert_eq!(stats, SchedulerStats::default());
    }

    #[test]
    fn test_derived_fields() {
        let counters = StatsCounters {
            total_tasks: 4,
            completed_tasks: 3,
            failed_tasks: 1,
            cancelled_tasks: 0,
            total_duration: Duration::from_millis(300),
        };
        let stats = counters.snapshot();
        assert_eq!(stats.total_duration_ms, 300);
        assert!((stats.average_duration_ms - 100.0).abs() < 1e-9);
        assert!((stats.success_rate - 75.0).abs() < 1e-9);
    }
}
