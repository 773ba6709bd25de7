//! Poller configuration

use std::time::Duration;

/// Default interval between incremental polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Added to the cache high-water mark so the provider's inclusive start
/// bound does not return the last known point again
pub const DEFAULT_START_TIME_EPSILON: Duration = Duration::from_millis(5);

/// Pending points a consumer may fall behind before the poller blocks
pub const DEFAULT_STREAM_CAPACITY: usize = 1000;

/// What a poller does when a price query fails
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Terminate the policy on the first failed query
    #[default]
    FailFast,
    /// Retry a failed query with exponential backoff before giving up
    Retry {
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
    },
}

impl FailurePolicy {
    /// Total attempts allowed for one query, including the first one
    pub fn max_attempts(&self) -> u32 {
        match self {
            FailurePolicy::FailFast => 1,
            FailurePolicy::Retry { max_attempts, .. } => (*max_attempts).max(1),
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        match self {
            FailurePolicy::FailFast => Duration::ZERO,
            FailurePolicy::Retry {
                initial_backoff,
                max_backoff,
                ..
            } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                initial_backoff
                    .checked_mul(factor)
                    .unwrap_or(*max_backoff)
                    .min(*max_backoff)
            }
        }
    }
}

/// Per-policy poller settings shared by every policy of a monitor
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub start_time_epsilon: Duration,
    pub stream_capacity: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            start_time_epsilon: DEFAULT_START_TIME_EPSILON,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            failure_policy: FailurePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_reference_timings() {
        let config = PollerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.start_time_epsilon, Duration::from_millis(5));
        assert_eq!(config.stream_capacity, 1000);
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
    }

    #[test]
    fn test_fail_fast_allows_single_attempt() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::FailFast);
        assert_eq!(FailurePolicy::FailFast.max_attempts(), 1);
    }

    #[test]
    fn test_retry_backoff_doubles_and_caps() {
        let policy = FailurePolicy::Retry {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
        assert_eq!(policy.backoff(40), Duration::from_millis(350));
    }

    #[test]
    fn test_retry_with_zero_attempts_still_queries_once() {
        let policy = FailurePolicy::Retry {
            max_attempts: 0,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(10),
        };
        assert_eq!(policy.max_attempts(), 1);
    }
}
