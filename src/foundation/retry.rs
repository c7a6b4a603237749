use std::future::Future;

use crate::foundation::config::RetryPolicy;

/// Run `op` until it succeeds, `is_retryable` rejects its error, or attempts run out.
///
/// `op` receives the 1-based attempt number. Between attempts the task sleeps for
/// [`RetryPolicy::backoff_for`]; the last error is returned unchanged.
pub async fn retry_with_backoff<T, E, Fut>(
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut op: impl FnMut(u32) -> Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                let delay = policy.backoff_for(attempt);
                tracing::debug!(attempt, ?delay, error = %e, "retrying after transient failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/retry.rs"]
mod tests;
