//! Bounded retry for rate-limited requests.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::Result;
use crate::error::Error;

/// How many times a rate-limited request is retried before the error
/// reaches the caller.
pub(crate) const RATE_LIMIT_RETRIES: u32 = 3;

/// Run one transport attempt, retrying while the service reports 429.
///
/// Each retry sleeps for the interval the service specified. A reply
/// without a positive interval, or an exhausted retry budget, propagates
/// the rate-limit error unchanged. All other outcomes pass straight
/// through.
pub(crate) async fn with_rate_limit_retry<F, Fut, T>(mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retries = 0;
    loop {
        match attempt().await {
            Err(Error::TooManyRequests { retry_after })
                if retry_after > 0.0 && retries < RATE_LIMIT_RETRIES =>
            {
                retries += 1;
                debug!(retry = retries, wait_s = retry_after, "rate limited, backing off");
                tokio::time::sleep(Duration::from_secs_f64(retry_after)).await;
            }
            outcome => return outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rate_limited(retry_after: f64) -> Error {
        Error::TooManyRequests { retry_after }
    }

    #[tokio::test]
    async fn success_passes_straight_through() {
        let calls = AtomicU32::new(0);
        let result = with_rate_limit_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(7) }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_the_rate_limit_clears() {
        let calls = AtomicU32::new(0);
        let result = with_rate_limit_retry(|| {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(rate_limited(0.5))
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhaustion_surfaces_the_final_429() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_rate_limit_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(rate_limited(0.25)) }
        })
        .await;
        assert!(matches!(
            result,
            Err(Error::TooManyRequests { retry_after }) if retry_after == 0.25
        ));
        // The initial attempt plus the full retry budget.
        assert_eq!(calls.load(Ordering::SeqCst), 1 + RATE_LIMIT_RETRIES);
    }

    #[tokio::test]
    async fn missing_retry_interval_disables_the_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_rate_limit_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(rate_limited(0.0)) }
        })
        .await;
        assert!(matches!(result, Err(Error::TooManyRequests { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unrelated_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_rate_limit_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::Forbidden {
                    message: "no".to_owned(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
