//! Timeout and bounded retry for external calls.
//!
//! Every network-facing call (holiday APIs, quote API, browser scrape,
//! webhook delivery) runs under a [`CallPolicy`]: a hard timeout per attempt
//! and a small number of retries on transient failures only.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use bell_common::ReliabilityConfig;

use crate::error::{DeliveryError, HolidaySourceError, MarketDataError};

/// Timeout and retry settings for one class of external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    /// Upper bound for a single attempt
    pub timeout: Duration,
    /// Retries after the first attempt
    pub retries: u32,
    /// Base delay before a retry (multiplied by the attempt number)
    pub backoff: Duration,
}

impl CallPolicy {
    /// A policy that never retries.
    pub fn once(timeout: Duration) -> Self {
        Self {
            timeout,
            retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Policy for plain HTTP calls.
    pub fn http(config: &ReliabilityConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.request_timeout_secs),
            retries: config.retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Policy for a full headless-browser scrape.
    pub fn browser(config: &ReliabilityConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.browser_timeout_secs),
            ..Self::http(config)
        }
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.retries + 1
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::http(&ReliabilityConfig::default())
    }
}

/// Errors that can tell whether retrying is worthwhile.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for HolidaySourceError {
    fn is_transient(&self) -> bool {
        HolidaySourceError::is_transient(self)
    }
}

impl Transient for MarketDataError {
    fn is_transient(&self) -> bool {
        MarketDataError::is_transient(self)
    }
}

impl Transient for DeliveryError {
    fn is_transient(&self) -> bool {
        DeliveryError::is_transient(self)
    }
}

/// Run `op` under `policy`.
///
/// A timed-out attempt is turned into an error with `on_timeout`. Only
/// transient errors are retried; the last error is returned once attempts
/// are exhausted.
pub async fn call_with_policy<T, E, F, Fut, G>(
    policy: &CallPolicy,
    label: &str,
    on_timeout: G,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    G: Fn() -> E,
    E: Transient + Display,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        let result = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout()),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && e.is_transient() => {
                warn!(
                    call = label,
                    attempt,
                    max_attempts,
                    error = %e,
                    "External call failed, retrying..."
                );
                tokio::time::sleep(policy.backoff * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(retries: u32) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_secs(5),
            retries,
            backoff: Duration::from_millis(100),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_once() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, MarketDataError> = call_with_policy(
            &policy(1),
            "test",
            || MarketDataError::Timeout { secs: 5 },
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(MarketDataError::Network("reset".into()))
                } else {
                    Ok(7)
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);

        let result: Result<(), MarketDataError> = call_with_policy(
            &policy(3),
            "test",
            || MarketDataError::Timeout { secs: 5 },
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(MarketDataError::Parse {
                    field: "index",
                    raw: "n/a".into(),
                })
            },
        )
        .await;

        assert!(matches!(result, Err(MarketDataError::Parse { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_error() {
        let calls = AtomicU32::new(0);

        let result: Result<(), DeliveryError> = call_with_policy(
            &policy(1),
            "test",
            || DeliveryError::Timeout,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            },
        )
        .await;

        assert_eq!(result, Err(DeliveryError::Timeout));
        // Timeouts are transient, so the single retry is used
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_policy_from_config() {
        let config = ReliabilityConfig::default();
        let http = CallPolicy::http(&config);
        let browser = CallPolicy::browser(&config);
        assert_eq!(http.timeout, Duration::from_secs(30));
        assert_eq!(browser.timeout, Duration::from_secs(60));
        assert_eq!(browser.max_attempts(), 2);
        assert_eq!(CallPolicy::once(Duration::from_secs(1)).max_attempts(), 1);
    }
}
