//! Bounded retry with a fixed pause between attempts.
//!
//! Both node probes (connection and authentication) share this combinator;
//! they differ only in which errors they are willing to wait out.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

/// Attempt budget and pause for one retried operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (minimum 1)
    pub max_attempts: u32,
    /// Pause between attempts
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

/// Run `operation` until it succeeds, fails with an error `is_retryable`
/// rejects, or the attempt budget is spent.
///
/// The last error is returned when the budget runs out.
pub async fn retry_if<F, Fut, T, E, P>(
    policy: RetryPolicy,
    operation_name: &str,
    is_retryable: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !is_retryable(&e) => return Err(e),
            Err(e) => {
                if attempt >= max_attempts {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Retry budget exhausted"
                    );
                    return Err(e);
                }

                warn!(
                    operation = %operation_name,
                    error = %e,
                    "{} / {}",
                    attempt,
                    max_attempts
                );

                tokio::time::sleep(policy.backoff).await;
            }
        }
    }
}
