//! Retry mechanism with increasing backoff
//!
//! Every network operation a backend performs (listing, transfers, the
//! connection probe) goes through [`retry_with_backoff`], so the attempt budget
//! and sleep schedule live in exactly one place.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `initial * attempt`
    #[default]
    Linear,
    /// `initial * 2^(attempt-1)`
    Exponential,
}

/// Retry policy shared by all operations of a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub strategy: BackoffStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            strategy: BackoffStrategy::Linear,
        }
    }
}

/// Retry a fallible async operation with increasing backoff
///
/// The operation runs at most `config.max_attempts` times. After a retryable
/// failure with attempts left, the task sleeps for the backoff of the failed
/// attempt and tries again. A failure on the last attempt, or one rejected by
/// `is_retryable`, is returned as is without sleeping.
///
/// # Example
/// ```ignore
/// let keys = retry_with_backoff(
///     &config,
///     || async { client.list_page(&bucket, &prefix).await },
///     Error::is_retryable,
/// ).await?;
/// ```
pub async fn retry_with_backoff<T, F, Fut, R>(
    config: &RetryConfig,
    mut operation: F,
    is_retryable: R,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    R: Fn(&Error) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt >= max_attempts || !is_retryable(&e) {
                    return Err(e);
                }

                let backoff = calculate_backoff(config, attempt);
                tracing::debug!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Retrying after failed attempt"
                );

                tokio::time::sleep(backoff).await;
            }
        }
    }
}

/// Backoff to wait after the given (1-based) failed attempt.
///
/// Non-decreasing in `attempt` for both strategies.
pub fn calculate_backoff(config: &RetryConfig, attempt: u32) -> Duration {
    let attempt = attempt.max(1);
    let base_ms = match config.strategy {
        BackoffStrategy::Linear => config.initial_backoff_ms.saturating_mul(attempt as u64),
        BackoffStrategy::Exponential => config
            .initial_backoff_ms
            .saturating_mul(1u64 << (attempt - 1).min(20)),
    };

    Duration::from_millis(base_ms.min(config.max_backoff_ms))
}

/// Retry configuration builder for easy customization
#[derive(Debug, Clone)]
pub struct RetryBuilder {
    config: RetryConfig,
}

impl RetryBuilder {
    pub fn new() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn initial_backoff_ms(mut self, ms: u64) -> Self {
        self.config.initial_backoff_ms = ms;
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.config.max_backoff_ms = ms;
        self
    }

    pub fn strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn build(self) -> RetryConfig {
        self.config
    }
}

impl Default for RetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn test_linear_backoff() {
        let config = RetryConfig::default();

        assert_eq!(calculate_backoff(&config, 1), Duration::from_secs(1));
        assert_eq!(calculate_backoff(&config, 2), Duration::from_secs(2));
        assert_eq!(calculate_backoff(&config, 3), Duration::from_secs(3));
    }

    #[test]
    fn test_exponential_backoff() {
        let config = RetryBuilder::new()
            .initial_backoff_ms(100)
            .strategy(BackoffStrategy::Exponential)
            .build();

        assert_eq!(calculate_backoff(&config, 1), Duration::from_millis(100));
        assert_eq!(calculate_backoff(&config, 2), Duration::from_millis(200));
        assert_eq!(calculate_backoff(&config, 3), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_cap_is_monotonic() {
        let config = RetryBuilder::new()
            .max_attempts(30)
            .initial_backoff_ms(1000)
            .max_backoff_ms(5000)
            .strategy(BackoffStrategy::Exponential)
            .build();

        let mut previous = Duration::ZERO;
        for attempt in 1..30 {
            let b = calculate_backoff(&config, attempt);
            assert!(b >= previous);
            assert!(b <= Duration::from_millis(5000));
            previous = b;
        }
    }

    #[test]
    fn test_retry_builder() {
        let config = RetryBuilder::new()
            .max_attempts(5)
            .initial_backoff_ms(200)
            .max_backoff_ms(20000)
            .build();

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_backoff_ms, 200);
        assert_eq!(config.max_backoff_ms, 20000);
        assert_eq!(config.strategy, BackoffStrategy::Linear);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_first_attempt() {
        let config = RetryConfig::default();
        let mut calls = 0;
        let start = Instant::now();

        let result = retry_with_backoff(
            &config,
            || {
                calls += 1;
                async { Ok::<_, Error>(42) }
            },
            Error::is_retryable,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_success_on_last_attempt() {
        let config = RetryConfig::default();
        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = call_count.clone();
        let start = Instant::now();

        let result = retry_with_backoff(
            &config,
            || {
                let cc = call_count_clone.clone();
                async move {
                    let count = cc.fetch_add(1, Ordering::SeqCst);
                    if count < 2 {
                        Err(Error::Transfer("timeout".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            },
            Error::is_retryable,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
        // Two sleeps: 1s after the first failure, 2s after the second
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhausted_returns_last_error() {
        let config = RetryConfig::default();
        let mut calls = 0;
        let start = Instant::now();

        let result: Result<()> = retry_with_backoff(
            &config,
            || {
                calls += 1;
                let attempt = calls;
                async move { Err(Error::Transfer(format!("attempt {attempt} failed"))) }
            },
            Error::is_retryable,
        )
        .await;

        match result {
            Err(Error::Transfer(msg)) => assert_eq!(msg, "attempt 3 failed"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(calls, 3);
        // No sleep after the final attempt
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_non_retryable() {
        let config = RetryConfig::default();
        let mut calls = 0;

        let result: Result<()> = retry_with_backoff(
            &config,
            || {
                calls += 1;
                async { Err(Error::InvalidPath("".to_string())) }
            },
            Error::is_retryable,
        )
        .await;

        assert!(matches!(result, Err(Error::InvalidPath(_))));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_still_runs_once() {
        let config = RetryBuilder::new().max_attempts(0).build();
        let mut calls = 0;

        let result: Result<()> = retry_with_backoff(
            &config,
            || {
                calls += 1;
                async { Err(Error::Transfer("down".to_string())) }
            },
            Error::is_retryable,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_config_from_toml() {
        let config: RetryConfig =
            toml::from_str("max_attempts = 5\nstrategy = \"exponential\"").unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.strategy, BackoffStrategy::Exponential);
        assert_eq!(config.initial_backoff_ms, 1000);
    }
}
