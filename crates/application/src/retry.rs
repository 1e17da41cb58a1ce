use std::future::Future;
use std::time::Duration;

use domain::ingest::error::EnrichError;

/// Configuration for retry with backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries (after the initial attempt).
    pub max_retries: usize,
    /// Backoff delays between retries. If fewer entries than `max_retries`,
    /// the last entry is repeated.
    pub backoff_schedule: Vec<Duration>,
    /// Timeout per individual attempt.
    pub timeout: Duration,
    /// Longest wait accepted between attempts. A remote side asking for
    /// more ends the retry loop with its error instead.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            backoff_schedule: vec![Duration::from_secs(15)],
            timeout: Duration::from_secs(30),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// No retries: one attempt bounded by `timeout`.
    pub fn single_attempt(timeout: Duration) -> Self {
        Self {
            max_retries: 0,
            backoff_schedule: Vec::new(),
            timeout,
            max_delay: Duration::ZERO,
        }
    }

    fn backoff_for(&self, attempt: usize) -> Duration {
        self.backoff_schedule
            .get(attempt)
            .copied()
            .unwrap_or_else(|| {
                self.backoff_schedule
                    .last()
                    .copied()
                    .unwrap_or(Duration::from_secs(1))
            })
    }
}

/// Errors that know whether another attempt is worthwhile.
pub trait Retryable: Sized {
    fn is_retryable(&self) -> bool;

    /// Delay requested by the remote side, overriding the backoff schedule.
    fn advertised_delay(&self) -> Option<Duration> {
        None
    }

    /// Error reported when an attempt exceeds the per-attempt timeout.
    fn timed_out(after: Duration) -> Self;
}

/// Only throttling is worth retrying within a run; transport failures and
/// missing reports are left for the next scheduled run.
impl Retryable for EnrichError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    fn advertised_delay(&self) -> Option<Duration> {
        self.retry_after()
    }

    fn timed_out(after: Duration) -> Self {
        Self::Transport(format!("attempt timed out after {after:?}"))
    }
}

/// Execute an async operation with retry and backoff.
///
/// The closure `f` is called up to `1 + max_retries` times, each attempt
/// wrapped in the per-attempt timeout. Non-retryable errors are returned
/// immediately; otherwise the function sleeps for the advertised delay, or
/// the scheduled backoff, before trying again. A delay above
/// `config.max_delay` is never slept; the error is returned as is.
pub async fn retry_with_backoff<T, E, F, Fut>(config: &RetryConfig, mut f: F) -> Result<T, E>
where
    E: Retryable,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;

    loop {
        let err = match tokio::time::timeout(config.timeout, f()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_elapsed) => E::timed_out(config.timeout),
        };

        if attempt >= config.max_retries || !err.is_retryable() {
            return Err(err);
        }

        let delay = err
            .advertised_delay()
            .unwrap_or_else(|| config.backoff_for(attempt));
        if delay > config.max_delay {
            tracing::debug!(
                delay_secs = delay.as_secs(),
                max_delay_secs = config.max_delay.as_secs(),
                "requested delay exceeds limit, giving up"
            );
            return Err(err);
        }
        tracing::debug!(
            attempt = attempt + 1,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "retrying after backoff"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
        TimedOut,
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, Self::Transient)
        }

        fn timed_out(_after: Duration) -> Self {
            Self::TimedOut
        }
    }

    fn fast_config(max_retries: usize) -> RetryConfig {
        RetryConfig {
            max_retries,
            backoff_schedule: vec![Duration::from_millis(1)],
            timeout: Duration::from_secs(1),
            max_delay: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn succeeds_first_try() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<u32, TestError> = retry_with_backoff(&fast_config(3), || {
            calls_clone.fetch_add(1, Ordering::Relaxed);
            async { Ok(7) }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn succeeds_after_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<(), TestError> = retry_with_backoff(&fast_config(3), || {
            let attempt = calls_clone.fetch_add(1, Ordering::Relaxed);
            async move {
                if attempt < 2 {
                    Err(TestError::Transient)
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn all_retries_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<(), TestError> = retry_with_backoff(&fast_config(2), || {
            calls_clone.fetch_add(1, Ordering::Relaxed);
            async { Err(TestError::Transient) }
        })
        .await;

        assert!(matches!(result, Err(TestError::Transient)));
        // 1 initial + 2 retries = 3 total
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn permanent_error_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<(), TestError> = retry_with_backoff(&fast_config(5), || {
            calls_clone.fetch_add(1, Ordering::Relaxed);
            async { Err(TestError::Permanent) }
        })
        .await;

        assert!(matches!(result, Err(TestError::Permanent)));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn timeout_enforced() {
        let config = RetryConfig::single_attempt(Duration::from_millis(10));

        let result: Result<(), TestError> = retry_with_backoff(&config, || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(TestError::TimedOut)));
    }

    #[tokio::test]
    async fn backoff_schedule_respected() {
        let config = RetryConfig {
            max_retries: 2,
            backoff_schedule: vec![Duration::from_millis(50), Duration::from_millis(100)],
            timeout: Duration::from_secs(1),
            max_delay: Duration::from_secs(1),
        };

        let start = tokio::time::Instant::now();
        let _: Result<(), TestError> =
            retry_with_backoff(&config, || async { Err(TestError::Transient) }).await;
        let elapsed = start.elapsed();

        // Should have waited at least 50ms + 100ms = 150ms
        assert!(
            elapsed >= Duration::from_millis(140),
            "elapsed: {elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_honours_retry_after() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let config = RetryConfig {
            max_retries: 1,
            backoff_schedule: vec![Duration::from_millis(1)],
            timeout: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
        };

        let start = tokio::time::Instant::now();
        let result = retry_with_backoff(&config, || {
            let attempt = calls_clone.fetch_add(1, Ordering::Relaxed);
            async move {
                if attempt == 0 {
                    Err(EnrichError::RateLimited {
                        retry_after_secs: Some(20),
                    })
                } else {
                    Ok("report")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "report");
        assert!(start.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_beyond_max_delay_is_not_slept() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);
        let config = RetryConfig {
            max_retries: 3,
            backoff_schedule: vec![Duration::from_secs(15)],
            timeout: Duration::from_secs(30),
            max_delay: Duration::from_secs(60),
        };

        let start = tokio::time::Instant::now();
        let result: Result<(), EnrichError> = retry_with_backoff(&config, || {
            calls_clone.fetch_add(1, Ordering::Relaxed);
            async {
                Err(EnrichError::RateLimited {
                    retry_after_secs: Some(86_400),
                })
            }
        })
        .await;

        assert!(matches!(
            result,
            Err(EnrichError::RateLimited {
                retry_after_secs: Some(86_400)
            })
        ));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn enrich_not_found_is_final() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let result: Result<(), EnrichError> = retry_with_backoff(&fast_config(3), || {
            calls_clone.fetch_add(1, Ordering::Relaxed);
            async { Err(EnrichError::NotFound("h1".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(EnrichError::NotFound(_))));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }
}
