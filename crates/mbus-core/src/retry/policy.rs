use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::config::RetryConfig;

use super::classify::{classify, ErrorClass};

/// Decides whether a failed message may be resent, and after how long.
///
/// Implementations must be cheap: they are consulted on the transport's
/// reply path.
pub trait RetryPolicy: Send + Sync {
    /// Whether an error with this code may be retried at all.
    fn can_retry(&self, error_code: u32) -> bool;

    /// Default delay in seconds before the `retry`-th resend (1-based).
    fn retry_delay(&self, retry: u32) -> f64;

    /// Delay before the next resend of a message that has already been
    /// resent `retry_count` times, or `None` when it must not be resent.
    fn should_retry(&self, retry_count: u32, error_code: u32) -> Option<f64> {
        if !self.can_retry(error_code) {
            return None;
        }
        Some(self.retry_delay(retry_count.saturating_add(1)))
    }
}

/// Retries every transient error with linear back-off:
/// `base_delay`, `2 * base_delay`, `3 * base_delay`, ...
///
/// Both knobs can be changed while the policy is shared with a running
/// resender.
#[derive(Debug)]
pub struct RetryTransientErrorsPolicy {
    enabled: AtomicBool,
    base_delay_bits: AtomicU64,
}

impl Default for RetryTransientErrorsPolicy {
    fn default() -> Self {
        Self::new(true, 1.0)
    }
}

impl RetryTransientErrorsPolicy {
    pub fn new(enabled: bool, base_delay_secs: f64) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            base_delay_bits: AtomicU64::new(sanitize(base_delay_secs).to_bits()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) -> &Self {
        self.enabled.store(enabled, Ordering::Relaxed);
        self
    }

    pub fn base_delay(&self) -> f64 {
        f64::from_bits(self.base_delay_bits.load(Ordering::Relaxed))
    }

    /// Negative or non-finite values are treated as zero.
    pub fn set_base_delay(&self, secs: f64) -> &Self {
        self.base_delay_bits
            .store(sanitize(secs).to_bits(), Ordering::Relaxed);
        self
    }
}

fn sanitize(secs: f64) -> f64 {
    if secs.is_finite() && secs > 0.0 {
        secs
    } else {
        0.0
    }
}

impl RetryPolicy for RetryTransientErrorsPolicy {
    fn can_retry(&self, error_code: u32) -> bool {
        self.enabled() && classify(error_code) == ErrorClass::Transient
    }

    fn retry_delay(&self, retry: u32) -> f64 {
        self.base_delay() * f64::from(retry)
    }
}

impl From<&RetryConfig> for RetryTransientErrorsPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self::new(cfg.enabled, cfg.base_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_code::{APP_FATAL_ERROR, APP_TRANSIENT_ERROR, NONE};

    #[test]
    fn no_retry_for_fatal_or_none() {
        let p = RetryTransientErrorsPolicy::default();
        assert_eq!(p.should_retry(0, APP_FATAL_ERROR), None);
        assert_eq!(p.should_retry(0, NONE), None);
    }

    #[test]
    fn linear_backoff_from_base_delay() {
        let p = RetryTransientErrorsPolicy::new(true, 0.5);
        assert_eq!(p.should_retry(0, APP_TRANSIENT_ERROR), Some(0.5));
        assert_eq!(p.should_retry(1, APP_TRANSIENT_ERROR), Some(1.0));
        assert_eq!(p.should_retry(3, APP_TRANSIENT_ERROR), Some(2.0));
    }

    #[test]
    fn zero_base_delay_is_immediate() {
        let p = RetryTransientErrorsPolicy::new(true, 0.0);
        assert_eq!(p.should_retry(7, APP_TRANSIENT_ERROR), Some(0.0));
    }

    #[test]
    fn disabled_policy_never_retries() {
        let p = RetryTransientErrorsPolicy::default();
        p.set_enabled(false);
        assert_eq!(p.should_retry(0, APP_TRANSIENT_ERROR), None);
        p.set_enabled(true);
        assert!(p.should_retry(0, APP_TRANSIENT_ERROR).is_some());
    }

    #[test]
    fn base_delay_is_sanitized() {
        let p = RetryTransientErrorsPolicy::new(true, -3.0);
        assert_eq!(p.base_delay(), 0.0);
        p.set_base_delay(f64::NAN);
        assert_eq!(p.base_delay(), 0.0);
        p.set_base_delay(0.01);
        assert_eq!(p.base_delay(), 0.01);
    }

    #[test]
    fn built_from_config() {
        let cfg = RetryConfig {
            enabled: false,
            base_delay_secs: 0.25,
            max_retries: None,
        };
        let p = RetryTransientErrorsPolicy::from(&cfg);
        assert!(!p.enabled());
        assert_eq!(p.base_delay(), 0.25);
    }
}
