//! Retry loop for catalog fetches.
//!
//! Only socket-level faults (timeout, connection reset) are retried;
//! an HTTP error status is an application-level answer and surfaces
//! immediately. 3 attempts total, exponential backoff between them.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::UpstreamError;

pub const MAX_ATTEMPTS: usize = 3;

/// Outcome of a single fetch attempt.
#[derive(Debug)]
pub enum FetchFailure {
    /// Connection-level fault worth retrying.
    Transient(String),
    /// Application-level failure; surfaced as-is, no further attempts.
    Fatal(UpstreamError),
}

/// Classifies a `reqwest` error into retry-or-surface.
///
/// Decode errors mean the vendor answered with an undecodable body,
/// which retrying will not fix. Everything else on this path is a
/// transport fault.
pub fn classify(error: reqwest::Error) -> FetchFailure {
    if error.is_decode() {
        FetchFailure::Fatal(UpstreamError::Malformed(error.to_string()))
    } else {
        FetchFailure::Transient(error.to_string())
    }
}

/// Runs `op` up to [`MAX_ATTEMPTS`] times, sleeping `2^(attempt-1)`
/// seconds before attempts 2 and 3 (i.e. 2s, then 4s).
pub async fn with_retries<T, F, Fut>(what: &str, mut op: F) -> Result<T, UpstreamError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchFailure>>,
{
    let mut last = String::new();

    for attempt in 1..=MAX_ATTEMPTS {
        if attempt > 1 {
            let delay = Duration::from_secs(1u64 << (attempt - 1));
            tokio::time::sleep(delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(FetchFailure::Fatal(error)) => return Err(error),
            Err(FetchFailure::Transient(message)) => {
                warn!(
                    "{}: attempt {}/{} failed: {}",
                    what, attempt, MAX_ATTEMPTS, message
                );
                last = message;
            }
        }
    }

    Err(UpstreamError::Exhausted {
        attempts: MAX_ATTEMPTS,
        last,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_after_two_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));

        let result = with_retries("test", || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(FetchFailure::Transient("connection reset".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_exactly_three_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));

        let result: Result<(), _> = with_retries("test", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchFailure::Transient("timeout".into()))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result.unwrap_err() {
            UpstreamError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "timeout");
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_http_error_status_is_never_retried() {
        let calls = Arc::new(AtomicUsize::new(0));

        let result: Result<(), _> = with_retries("test", || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchFailure::Fatal(UpstreamError::Status {
                    status: 429,
                    body: "rate limited".into(),
                }))
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match result.unwrap_err() {
            UpstreamError::Status { status, .. } => assert_eq!(status, 429),
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_are_two_then_four_seconds() {
        let start = tokio::time::Instant::now();

        let _: Result<(), _> = with_retries("test", || async {
            Err(FetchFailure::Transient("reset".into()))
        })
        .await;

        // 2s before attempt 2, 4s before attempt 3.
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }
}
