//! Bounded retry combinators
//!
//! UI synchronization in revisit is always a bounded poll: a fixed number of
//! attempts with a fixed wait, never an open-ended loop. Infrastructure that may
//! fail without affecting the run (assistant calls, ledger bookkeeping after an
//! action already happened) goes through [`fail_open`].

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::Result;

/// Run an operation that should not take the caller down with it
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
/// Fatal errors are logged the same way, so only use this where losing the
/// session would surface on the next step anyway.
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

/// Retry an operation up to `max_attempts` times with linear backoff
///
/// The wait before attempt `n + 1` is `base_delay * n`. Fatal errors are
/// returned immediately without further attempts.
pub async fn with_retries<F, Fut, T>(
    operation_name: &str,
    mut f: F,
    max_attempts: usize,
    base_delay: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(val) => return Ok(val),
            Err(e) if e.is_fatal() || attempt >= max_attempts => {
                warn!(
                    "{} failed after {} attempt(s): {}",
                    operation_name, attempt, e
                );
                return Err(e);
            }
            Err(e) => {
                debug!(
                    "{} failed (attempt {}/{}): {}",
                    operation_name, attempt, max_attempts, e
                );
                sleep_if_positive(base_delay * attempt as u32).await;
                attempt += 1;
            }
        }
    }
}

/// Poll a condition until it holds or the attempts run out
///
/// Returns `Ok(true)` as soon as `check` yields true and `Ok(false)` once
/// `attempts` checks have all yielded false. Errors from `check` propagate.
pub async fn poll_until<F, Fut>(attempts: usize, interval: Duration, mut check: F) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    for attempt in 1..=attempts.max(1) {
        if check().await? {
            return Ok(true);
        }
        if attempt < attempts {
            sleep_if_positive(interval).await;
        }
    }
    Ok(false)
}

async fn sleep_if_positive(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RevisitError;

    #[tokio::test]
    async fn test_fail_open_success() {
        let result = fail_open("test_op", || async { Ok::<_, RevisitError>(42) }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_fail_open_failure() {
        let result = fail_open("test_op", || async {
            Err::<i32, _>(RevisitError::Other("test error".to_string()))
        })
        .await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_with_retries_success_after_retry() {
        let mut attempts = 0;
        let result = with_retries(
            "test_op",
            || {
                attempts += 1;
                async move {
                    if attempts < 2 {
                        Err(RevisitError::Interaction("not yet".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            },
            3,
            Duration::ZERO,
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn test_with_retries_exhausts() {
        let mut attempts = 0;
        let result = with_retries(
            "test_op",
            || {
                attempts += 1;
                async move { Err::<i32, _>(RevisitError::Interaction("stuck".to_string())) }
            },
            3,
            Duration::ZERO,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_with_retries_stops_on_fatal() {
        let mut attempts = 0;
        let result = with_retries(
            "test_op",
            || {
                attempts += 1;
                async move { Err::<i32, _>(RevisitError::SessionLost("gone".to_string())) }
            },
            5,
            Duration::ZERO,
        )
        .await;
        assert!(result.unwrap_err().is_fatal());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_poll_until_bounded() {
        let mut checks = 0;
        let held = poll_until(3, Duration::ZERO, || {
            checks += 1;
            async { Ok(false) }
        })
        .await
        .unwrap();
        assert!(!held);
        assert_eq!(checks, 3);

        let mut checks = 0;
        let held = poll_until(3, Duration::ZERO, || {
            checks += 1;
            let done = checks == 2;
            async move { Ok(done) }
        })
        .await
        .unwrap();
        assert!(held);
        assert_eq!(checks, 2);
    }
}
