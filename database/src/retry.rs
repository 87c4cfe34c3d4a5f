use std::{future::Future, pin::Pin, time::Duration};

use tokio::time::sleep;

pub type BoxedAttempt<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(50),
        }
    }
}

/// Re-runs `operation` with doubling delays until it succeeds or the policy
/// runs out, then hands back the last error.
pub async fn retry_with_backoff<F, T, E>(mut operation: F, policy: RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> BoxedAttempt<T, E>,
    E: std::fmt::Display,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < policy.max_retries => {
                attempt += 1;
                tracing::warn!(attempt, ?delay, "event log write failed: {e}, retrying");
                sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
