// src/utils/retry.rs
use crate::error::ExchangeError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Runs `operation` until it succeeds, fails permanently, or runs out of attempts.
///
/// Only temporary failures are repeated, with a fixed delay between attempts.
/// Running out of attempts wraps the last failure in `RetriesExhausted`.
pub async fn retry_operation<T, F, Fut>(
    config: RetryConfig,
    label: &str,
    mut operation: F,
) -> Result<T, ExchangeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExchangeError>>,
{
    let attempts = config.max_retries.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            tokio::time::sleep(config.delay).await;
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_temporary() => return Err(e),
            Err(e) => {
                warn!("{} failed (attempt {}/{}): {}", label, attempt, attempts, e);
                last_err = Some(e);
            }
        }
    }

    Err(ExchangeError::RetriesExhausted {
        attempts,
        last: Box::new(last_err.unwrap_or_else(|| ExchangeError::Http("no attempt made".into()))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_two_timeouts() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = retry_operation(RetryConfig::default(), "get_balances", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ExchangeError::Http("gateway Timeout".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(2) && waited < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_operation(RetryConfig::default(), "place_order", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ExchangeError::Api {
                    code: "51000".into(),
                    message: "Parameter sz error".into(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(ExchangeError::Api { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_wraps_last_error() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_operation(RetryConfig::default(), "get_klines", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ExchangeError::RateLimited("Too Many Requests".into())) }
        })
        .await;

        match result {
            Err(ExchangeError::RetriesExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, ExchangeError::RateLimited(_)));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
