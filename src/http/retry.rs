//! Retry policy for transient failures.

use std::time::Duration;

use super::request::Method;
use crate::error::HttpError;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default initial backoff delay.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(300);

/// Exponential backoff: `base_delay * 2^attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Whether a failed attempt (zero-based) should be followed by another.
    ///
    /// Only GET is retried, and only on network failures and 5xx responses.
    pub fn should_retry(&self, method: Method, error: &HttpError, attempt: u32) -> bool {
        method.is_retry_safe() && error.is_transient() && attempt < self.max_retries
    }

    /// Delay before the retry that follows `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(300));
        assert_eq!(policy.delay_for(1), Duration::from_millis(600));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1200));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::new(100, Duration::from_secs(u64::MAX / 2));
        assert_eq!(policy.delay_for(3), Duration::MAX);
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::default();
        let server = HttpError::from_status(502, String::new());
        let network = HttpError::Network("reset".into());

        assert!(policy.should_retry(Method::Get, &server, 0));
        assert!(policy.should_retry(Method::Get, &network, 1));
        assert!(!policy.should_retry(Method::Get, &server, 2));

        assert!(!policy.should_retry(Method::Post, &server, 0));
        assert!(!policy.should_retry(Method::Delete, &network, 0));

        let not_found = HttpError::from_status(404, String::new());
        assert!(!policy.should_retry(Method::Get, &not_found, 0));
        assert!(!policy.should_retry(Method::Get, &HttpError::Unauthorized, 0));
    }
}
