//! Configuration for the sync engine and device-auth flow.

use std::time::Duration;

/// Engine-wide timing and retry configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between device-code polls.
    pub poll_interval: Duration,
    /// Wall-clock validity of a device code, measured from creation.
    pub device_code_ttl: Duration,
    /// Per-attempt network timeout, independent of the retry budget.
    pub request_timeout: Duration,
    /// Retry policy for transient remote failures.
    pub retry: RetryConfig,
}

impl EngineConfig {
    /// Creates the default configuration: 5s polls, 5min code validity,
    /// 10s per-attempt timeout, three retries at 500ms/1s/2s.
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            device_code_ttl: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the device-code validity window.
    pub fn with_device_code_ttl(mut self, ttl: Duration) -> Self {
        self.device_code_ttl = ttl;
        self
    }

    /// Sets the per-attempt request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Retry policy for transient remote failures.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap on the computed delay.
    pub max_delay: Duration,
    /// Multiplier applied per retry.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Creates a policy with the given retry count.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the delay cap.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Delay before retry `n` (1-indexed): `initial * multiplier^(n-1)`,
    /// capped at `max_delay`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let secs = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(retry.saturating_sub(1) as i32);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timings() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.device_code_ttl, Duration::from_secs(300));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn backoff_ladder() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_for_retry(0), Duration::ZERO);
        assert_eq!(retry.delay_for_retry(1), Duration::from_millis(500));
        assert_eq!(retry.delay_for_retry(2), Duration::from_secs(1));
        assert_eq!(retry.delay_for_retry(3), Duration::from_secs(2));
    }

    #[test]
    fn backoff_respects_cap() {
        let retry = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(4))
            .with_backoff_multiplier(10.0);
        assert_eq!(retry.delay_for_retry(5), Duration::from_secs(4));
    }

    #[test]
    fn config_builder() {
        let config = EngineConfig::new()
            .with_poll_interval(Duration::from_secs(2))
            .with_device_code_ttl(Duration::from_secs(60))
            .with_request_timeout(Duration::from_secs(3))
            .with_retry(RetryConfig::no_retry());

        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.device_code_ttl, Duration::from_secs(60));
        assert_eq!(config.retry.max_retries, 0);
    }
}
