//! Wait policies for operation polling and resource-state polling

use skyward_config::{Settings, WaitSettings};
use std::time::Duration;

/// Consecutive not-found reads tolerated by a resource-state wait
pub const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;

/// No wait checks more often than this, whatever the policy says
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Timing applied to one category of waits
///
/// The first check happens after `delay`; later checks are spaced by
/// [`WaitPolicy::poll_interval`]. The interval is fixed, there is no backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Give up after this long
    pub timeout: Duration,

    /// Wait before the first check
    pub delay: Duration,

    /// Floor for the spacing between checks
    pub min_interval: Duration,

    /// Consecutive not-found reads tolerated (resource-state waits only)
    pub not_found_checks: u32,
}

impl WaitPolicy {
    /// Defaults for operation-handle polling
    pub fn operation() -> Self {
        Self {
            timeout: Duration::from_secs(10 * 60),
            delay: Duration::from_secs(5),
            min_interval: Duration::from_secs(3),
            not_found_checks: 0,
        }
    }

    /// Defaults for polling a resource's own state field
    pub fn resource_state() -> Self {
        Self {
            timeout: Duration::from_secs(20 * 60),
            delay: Duration::from_secs(5),
            min_interval: Duration::from_secs(3),
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Spacing between checks after the first one, never below [`MIN_POLL_INTERVAL`]
    pub fn poll_interval(&self) -> Duration {
        self.delay.max(self.min_interval).max(MIN_POLL_INTERVAL)
    }

    /// Apply the fields set in a settings section on top of this policy
    pub fn overlay(mut self, settings: &WaitSettings) -> Self {
        if let Some(secs) = settings.timeout_secs {
            self.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = settings.delay_secs {
            self.delay = Duration::from_secs(secs);
        }
        if let Some(secs) = settings.min_interval_secs {
            self.min_interval = Duration::from_secs(secs);
        }
        if let Some(checks) = settings.not_found_checks {
            self.not_found_checks = checks;
        }
        self
    }
}

/// The two wait categories used by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicies {
    pub operation: WaitPolicy,
    pub resource_state: WaitPolicy,
}

impl Default for WaitPolicies {
    fn default() -> Self {
        Self {
            operation: WaitPolicy::operation(),
            resource_state: WaitPolicy::resource_state(),
        }
    }
}

impl WaitPolicies {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            operation: WaitPolicy::operation().overlay(&settings.operation),
            resource_state: WaitPolicy::resource_state().overlay(&settings.resource_state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval_floor() {
        let policy = WaitPolicy::operation().with_delay(Duration::from_secs(1));
        assert_eq!(policy.poll_interval(), Duration::from_secs(3));

        let policy = WaitPolicy::operation().with_delay(Duration::from_secs(10));
        assert_eq!(policy.poll_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_zero_intervals_clamped_for_both_categories() {
        for policy in [WaitPolicy::operation(), WaitPolicy::resource_state()] {
            let policy = policy
                .with_delay(Duration::ZERO)
                .with_min_interval(Duration::ZERO);
            assert_eq!(policy.poll_interval(), MIN_POLL_INTERVAL);
        }
    }

    #[test]
    fn test_overlay_keeps_category_defaults() {
        let settings = Settings {
            resource_state: WaitSettings {
                delay_secs: Some(10),
                ..Default::default()
            },
            ..Default::default()
        };

        let policies = WaitPolicies::from_settings(&settings);
        assert_eq!(policies.operation, WaitPolicy::operation());
        assert_eq!(policies.resource_state.delay, Duration::from_secs(10));
        assert_eq!(policies.resource_state.timeout, Duration::from_secs(20 * 60));
        assert_eq!(
            policies.resource_state.not_found_checks,
            DEFAULT_NOT_FOUND_CHECKS
        );
    }
}
