use errors::PersistenceError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Embedding failed: {0}")]
    EmbeddingError(String),

    #[error("Invalid memory record: {0}")]
    ValidationError(String),

    #[error("Memory collection I/O failed: {0}")]
    StorageError(String),

    #[error("Embedding endpoint unreachable: {0}")]
    NetworkError(String),

    #[error("Embedding request timed out: {0}")]
    TimeoutError(String),

    #[error("Malformed memory payload: {0}")]
    SerializationError(String),

    #[error("Embedding endpoint is rate limiting: {0}")]
    RateLimited(String),

    #[error("Internal error: {0}")]
    InternalError(String)
}

impl MemoryError {
    /// Transport failures are worth another attempt; anything the endpoint
    /// answered deliberately is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MemoryError::NetworkError(_) | MemoryError::TimeoutError(_) | MemoryError::RateLimited(_)
        )
    }
}

impl From<MemoryError> for PersistenceError {
    fn from(err: MemoryError) -> Self {
        PersistenceError::new("memory store", err)
    }
}

impl From<reqwest::Error> for MemoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MemoryError::TimeoutError(err.to_string())
        } else if err.is_decode() {
            MemoryError::SerializationError(err.to_string())
        } else {
            MemoryError::NetworkError(err.to_string())
        }
    }
}

pub type MemoryResult<T> = Result<T, MemoryError>;

/// Exponential backoff for embedding calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Floor applied when the endpoint reports rate limiting.
    pub rate_limit_backoff: Duration,
    pub jitter: bool
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            rate_limit_backoff: Duration::from_secs(5),
            jitter: true
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based) after `err`.
    pub fn delay(&self, attempt: u32, err: &MemoryError) -> Duration {
        let exp = self
            .initial_backoff
            .saturating_mul(1u32 << (attempt.saturating_sub(1)).min(16))
            .min(self.max_backoff);
        let delay = if self.jitter {
            exp.mul_f32(0.85 + rand::random::<f32>() * 0.3)
        } else {
            exp
        };
        match err {
            MemoryError::RateLimited(_) => delay.max(self.rate_limit_backoff),
            _ => delay
        }
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// `max_retries` extra attempts are spent.
pub async fn with_retry<F, Fut, T>(operation: F, config: RetryConfig) -> MemoryResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = MemoryResult<T>>
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < config.max_retries && err.is_retryable() => {
                attempt += 1;
                let delay = config.delay(attempt, &err);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying embedding call");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            initial_backoff: Duration::from_millis(1),
            rate_limit_backoff: Duration::from_millis(1),
            jitter: false,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let calls = AtomicUsize::new(0);

        let result = with_retry(
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(MemoryError::NetworkError("connection reset".to_string()))
                } else {
                    Ok(vec![0.5f32])
                }
            },
            fast()
        )
        .await;

        assert_eq!(result.unwrap(), vec![0.5]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_bad_answers_fail_immediately() {
        let calls = AtomicUsize::new(0);

        let result: MemoryResult<Vec<f32>> = with_retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(MemoryError::EmbeddingError("expected 768 dimensions, got 3".to_string()))
            },
            fast()
        )
        .await;

        assert!(matches!(result, Err(MemoryError::EmbeddingError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicUsize::new(0);

        let result: MemoryResult<()> = with_retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(MemoryError::RateLimited("429".to_string()))
            },
            fast()
        )
        .await;

        assert!(matches!(result, Err(MemoryError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_delay_grows_and_respects_rate_limit_floor() {
        let config = RetryConfig {
            jitter: false,
            ..Default::default()
        };
        let network = MemoryError::NetworkError("down".to_string());
        assert_eq!(config.delay(1, &network), Duration::from_millis(100));
        assert_eq!(config.delay(3, &network), Duration::from_millis(400));
        assert_eq!(config.delay(20, &network), Duration::from_secs(10));

        let limited = MemoryError::RateLimited("slow down".to_string());
        assert_eq!(config.delay(1, &limited), Duration::from_secs(5));
    }
}
