use std::time::Duration;

use crate::limiter::RateLimitConfig;
use crate::transport::TransportConfig;

/// Everything the executor needs besides the authenticator.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub transport: TransportConfig,
    pub rate_limit: RateLimitConfig,
    /// Maximum requests in flight at once, reads and writes combined.
    pub gate_capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            rate_limit: RateLimitConfig::default(),
            gate_capacity: 1,
            retry: RetryPolicy::default(),
        }
    }
}

/// Ceiling and backoff for the 401 / 429 recovery loops.
///
/// `None` for a retry limit means retry forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Re-logins allowed for a single request.
    pub max_unauthorized_retries: Option<u32>,
    /// Replays allowed for a single request after HTTP 429.
    pub max_throttled_retries: Option<u32>,
    /// First 429 backoff; doubled on every further 429.
    pub initial_backoff: Duration,
    /// Upper bound for any 429 backoff, `Retry-After` included.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_unauthorized_retries: Some(3),
            max_throttled_retries: Some(8),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Retry 401 and 429 indefinitely, without backoff; the limiter alone
    /// paces replays.
    pub fn unbounded() -> Self {
        Self {
            max_unauthorized_retries: None,
            max_throttled_retries: None,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub(crate) fn unauthorized_exhausted(&self, seen: u32) -> bool {
        self.max_unauthorized_retries.is_some_and(|max| seen > max)
    }

    pub(crate) fn throttled_exhausted(&self, seen: u32) -> bool {
        self.max_throttled_retries.is_some_and(|max| seen > max)
    }

    /// Delay before the replay following the `attempt`-th 429 (1-based).
    ///
    /// A server-supplied `Retry-After` wins over the exponential schedule;
    /// both are capped at `max_backoff`.
    pub fn throttle_backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let delay = retry_after.unwrap_or_else(|| {
            let exp = attempt.saturating_sub(1).min(16);
            self.initial_backoff.saturating_mul(1 << exp)
        });
        delay.min(self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.throttle_backoff(1, None), Duration::from_secs(1));
        assert_eq!(policy.throttle_backoff(2, None), Duration::from_secs(2));
        assert_eq!(policy.throttle_backoff(4, None), Duration::from_secs(8));
        assert_eq!(policy.throttle_backoff(10, None), Duration::from_secs(30));
        assert_eq!(policy.throttle_backoff(u32::MAX, None), Duration::from_secs(30));
    }

    #[test]
    fn retry_after_is_honored_but_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.throttle_backoff(1, Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        assert_eq!(
            policy.throttle_backoff(1, Some(Duration::from_secs(600))),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn ceilings() {
        let policy = RetryPolicy::default();
        assert!(!policy.unauthorized_exhausted(3));
        assert!(policy.unauthorized_exhausted(4));
        assert!(!policy.throttled_exhausted(8));
        assert!(policy.throttled_exhausted(9));

        let forever = RetryPolicy::unbounded();
        assert!(!forever.unauthorized_exhausted(u32::MAX));
        assert!(!forever.throttled_exhausted(u32::MAX));
        assert_eq!(forever.throttle_backoff(7, None), Duration::ZERO);
    }
}
