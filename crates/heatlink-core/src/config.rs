// ── Coordinator configuration ──
//
// Describes *how* the coordinator schedules refreshes. Built by the
// binary from its profile — core never reads config files. The refresh
// interval is validated here, before any scheduler state exists;
// out-of-range input is rejected, never clamped.

use std::time::Duration;

use crate::error::CoreError;

/// Scheduling configuration for a [`Coordinator`](crate::Coordinator).
///
/// The policy knobs (`command_timeout`, `stale_after`, `backoff_ceiling`)
/// default to multiples of the refresh interval but are independently
/// settable — the cloud service's confirmation latency and rate limits
/// are not published, so deployments may need to tune them.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    refresh_interval: Duration,
    /// How long a pending command may stay unconfirmed before it expires.
    /// Default: 2× the refresh interval.
    pub command_timeout: Duration,
    /// How long after the last successful fetch devices become stale.
    /// Default: 3× the refresh interval.
    pub stale_after: Duration,
    /// Upper bound for the failure backoff delay. Default: the interval
    /// range's upper bound (60 minutes).
    pub backoff_ceiling: Duration,
}

impl CoordinatorConfig {
    pub const MIN_INTERVAL_MINUTES: u64 = 1;
    pub const MAX_INTERVAL_MINUTES: u64 = 60;

    /// Create a configuration with the given refresh cadence.
    ///
    /// `interval_minutes` must be within 1–60 inclusive; anything else is
    /// a [`CoreError::Validation`].
    pub fn new(interval_minutes: u64) -> Result<Self, CoreError> {
        if !(Self::MIN_INTERVAL_MINUTES..=Self::MAX_INTERVAL_MINUTES).contains(&interval_minutes) {
            return Err(CoreError::Validation {
                field: "refresh_interval".into(),
                reason: format!(
                    "expected {}-{} minutes, got {interval_minutes}",
                    Self::MIN_INTERVAL_MINUTES,
                    Self::MAX_INTERVAL_MINUTES
                ),
            });
        }

        let refresh_interval = Duration::from_secs(interval_minutes * 60);
        Ok(Self {
            refresh_interval,
            command_timeout: refresh_interval * 2,
            stale_after: refresh_interval * 3,
            backoff_ceiling: Duration::from_secs(Self::MAX_INTERVAL_MINUTES * 60),
        })
    }

    /// The validated refresh cadence.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_backoff_ceiling(mut self, ceiling: Duration) -> Self {
        self.backoff_ceiling = ceiling;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn interval_bounds_are_inclusive() {
        assert!(CoordinatorConfig::new(1).is_ok());
        assert!(CoordinatorConfig::new(60).is_ok());
    }

    #[test]
    fn out_of_range_interval_is_rejected_not_clamped() {
        for bad in [0, 61, 90, u64::MAX] {
            let err = CoordinatorConfig::new(bad).unwrap_err();
            assert!(matches!(err, CoreError::Validation { .. }), "{bad}: {err}");
        }
    }

    #[test]
    fn policy_defaults_scale_with_interval() {
        let config = CoordinatorConfig::new(15).unwrap();
        assert_eq!(config.refresh_interval(), Duration::from_secs(900));
        assert_eq!(config.command_timeout, Duration::from_secs(1800));
        assert_eq!(config.stale_after, Duration::from_secs(2700));
        assert_eq!(config.backoff_ceiling, Duration::from_secs(3600));
    }
}
