//! Bounded retry of whole units of work.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use kinko_core::account::AccountError;
use kinko_core::chips::ChipError;
use kinko_core::collections::CollectionsError;
use kinko_core::ledger::LedgerError;
use kinko_core::loans::LoanError;
use kinko_core::tax::TaxError;
use kinko_shared::config::LedgerConfig;

/// How often and how patiently to retry transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Base delay; attempt `n` waits `n * backoff`.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Runs once, never retries.
    pub const NONE: Self = Self {
        attempts: 1,
        backoff: Duration::ZERO,
    };
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&LedgerConfig::default())
    }
}

impl From<&LedgerConfig> for RetryPolicy {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }
}

/// Errors that know whether a retry can help.
pub trait Transient {
    /// Returns true if running the unit of work again may succeed.
    fn is_transient(&self) -> bool;
}

macro_rules! transient_via_is_retryable {
    ($($ty:ty),+) => {
        $(impl Transient for $ty {
            fn is_transient(&self) -> bool {
                self.is_retryable()
            }
        })+
    };
}

transient_via_is_retryable!(
    LedgerError,
    AccountError,
    ChipError,
    LoanError,
    TaxError,
    CollectionsError
);

/// Runs `operation` until it succeeds, fails permanently, or the attempts
/// are used up. The last error is returned unchanged.
pub async fn run<T, E, F, Fut>(policy: &RetryPolicy, name: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + Display,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.attempts => {
                tracing::warn!(operation = name, attempt, error = %err, "retrying after transient failure");
                tokio::time::sleep(policy.backoff * attempt).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = &AtomicU32::new(0);
        let result: Result<u32, LedgerError> = run(&policy(3), "test", || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(LedgerError::ExternalSystemUnavailable("lock timeout".into()))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), LedgerError> = run(&policy(2), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::ExternalSystemUnavailable("down".into()))
        })
        .await;
        assert!(matches!(result, Err(LedgerError::ExternalSystemUnavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_business_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), LedgerError> = run(&policy(5), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(LedgerError::InvalidAmount(rust_decimal::Decimal::ZERO))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from(&LedgerConfig::default());
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.backoff, Duration::from_millis(50));
    }
}
