use crate::types::{BloggerError, Result, RetryPolicy};
use backoff::backoff::{Backoff, Constant};
use std::future::Future;
use tracing::{debug, error, warn};

/// Classified result of one call to an external dependency.
#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    Retryable(BloggerError),
    Fatal(BloggerError),
}

impl<T> From<Result<T>> for Attempt<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Attempt::Success(value),
            Err(e) if e.is_transient() => Attempt::Retryable(e),
            Err(e) => Attempt::Fatal(e),
        }
    }
}

/// Runs `op` until it succeeds, fails fatally, or `policy.max_attempts` is
/// used up. The pause between attempts never grows.
pub async fn with_fixed_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = Constant::new(policy.delay);
    let mut attempt = 1;

    loop {
        match Attempt::from(op().await) {
            Attempt::Success(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", label, attempt);
                }
                return Ok(value);
            }
            Attempt::Fatal(e) => {
                error!("{} failed: {}", label, e);
                return Err(e);
            }
            Attempt::Retryable(e) if attempt < max_attempts => {
                let delay = backoff.next_backoff().unwrap_or(policy.delay);
                warn!(
                    "Attempt {}/{} of {} failed: {}; retrying in {:?}",
                    attempt, max_attempts, label, e, delay
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
            Attempt::Retryable(e) => {
                error!("{} failed after {} attempts: {}", label, max_attempts, e);
                return Err(e);
            }
        }
    }
}
