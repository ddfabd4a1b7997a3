// Warehouse Reader contract (C1).
//
// The core only ever depends on this trait: the concrete warehouse SDK
// (BigQuery or otherwise) and a test double both implement it.
use crate::error::{EtlError, Result};
use crate::domain::RowBatch;
use futures::stream::BoxStream;
use std::time::Duration;

pub type RowPageStream = BoxStream<'static, Result<RowBatch>>;

#[async_trait::async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Executes `sql` against the source warehouse and yields row batches
    /// lazily, one page at a time. MUST NOT eagerly materialize the full
    /// result set.
    async fn stream(&self, sql: &str, page_size: usize) -> Result<RowPageStream>;

    /// A short readiness probe: `LIMIT 10`, bounded by `timeout`.
    async fn test_connection(&self, timeout: Duration) -> Result<()>;
}

/// Exponential backoff for transient warehouse errors and timeouts.
/// Permanent errors and auth failures are never retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub exponent: u32,
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.exponent.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor.max(1))
    }

    pub fn is_retryable(err: &EtlError) -> bool {
        matches!(
            err,
            EtlError::TransientWarehouse(_) | EtlError::WarehouseTimeout(_)
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(30),
            exponent: 2,
        }
    }
}

/// Runs `op` with exponential backoff per `policy`, retrying only the error
/// kinds `RetryPolicy::is_retryable` accepts.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if RetryPolicy::is_retryable(&err) && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(attempt, ?delay, error = %err, "retrying warehouse operation");
                tokio::time::sleep(delay).await;
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
    use std::sync::Arc;

    #[test]
    fn delay_grows_exponentially() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            exponent: 2,
        };
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn retries_transient_errors_up_to_the_cap() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            exponent: 1,
        };

        let result: Result<u32> = with_retry(&policy, || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(EtlError::TransientWarehouse("boom".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::default();

        let result: Result<()> = with_retry(&policy, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(EtlError::PermanentWarehouse("missing table".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
