//! Back-off policy for backend calls.
//!
//! A 429 waits for the server's `Retry-After` when present. Other retriable
//! failures wait `base × 2ⁿ`, drawn uniformly from its upper half, capped at
//! [`MAX_DELAY`].

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::error::ClientError;

/// Longest single wait, whatever the server asks for.
pub(crate) const MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub(crate) const NONE: Self = Self {
        max_retries: 0,
        backoff_base: Duration::ZERO,
    };

    /// Exponential delay before retry number `retry` (0-based), without jitter.
    fn backoff(&self, retry: u32) -> Duration {
        self.backoff_base
            .saturating_mul(1u32 << retry.min(16))
            .min(MAX_DELAY)
    }

    /// How long to wait before retry number `retry`, or `None` to give up.
    pub(crate) fn delay_for(&self, err: &ClientError, retry: u32) -> Option<Duration> {
        if retry >= self.max_retries || !err.is_retriable() {
            return None;
        }
        if let ClientError::RateLimited {
            retry_after: Some(wait),
        } = err
        {
            return Some((*wait).min(MAX_DELAY));
        }
        let ceiling = self.backoff(retry);
        Some(ceiling.mul_f64(0.5 + rand::random::<f64>() / 2.0))
    }

    /// Runs `call` until it succeeds or the policy gives up.
    pub(crate) async fn run<T, F, Fut>(&self, mut call: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut retry = 0;
        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            let Some(wait) = self.delay_for(&err, retry) else {
                return Err(err);
            };
            retry += 1;
            tracing::warn!(
                retry,
                of = self.max_retries,
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "backend call failed, will retry"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

/// Parses `Retry-After` given in whole seconds. HTTP-date values are ignored.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use reqwest::header::HeaderValue;

    use super::*;

    fn policy(max_retries: u32, base_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff_base: Duration::from_millis(base_ms),
        }
    }

    fn server_error() -> ClientError {
        ClientError::Status {
            status: 503,
            url: "/api/search".to_string(),
        }
    }

    #[test]
    fn backoff_doubles_and_is_capped() {
        let p = policy(10, 1_000);
        assert_eq!(p.backoff(0), Duration::from_secs(1));
        assert_eq!(p.backoff(3), Duration::from_secs(8));
        assert_eq!(p.backoff(9), MAX_DELAY);
    }

    #[test]
    fn jittered_delay_stays_in_upper_half() {
        let p = policy(5, 800);
        for _ in 0..50 {
            let wait = p.delay_for(&server_error(), 1).unwrap();
            assert!(wait >= Duration::from_millis(800));
            assert!(wait <= Duration::from_millis(1_600));
        }
    }

    #[test]
    fn retry_after_overrides_backoff() {
        let p = policy(3, 60_000);
        let err = ClientError::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(p.delay_for(&err, 0), Some(Duration::from_secs(2)));

        let greedy = ClientError::RateLimited {
            retry_after: Some(Duration::from_secs(3_600)),
        };
        assert_eq!(p.delay_for(&greedy, 0), Some(MAX_DELAY));
    }

    #[test]
    fn final_errors_and_spent_budget_give_up() {
        let not_found = ClientError::Status {
            status: 404,
            url: "/api/search".to_string(),
        };
        assert_eq!(policy(3, 0).delay_for(&not_found, 0), None);
        assert_eq!(policy(2, 0).delay_for(&server_error(), 2), None);
        assert_eq!(RetryPolicy::NONE.delay_for(&server_error(), 0), None);
    }

    #[test]
    fn retry_after_parses_seconds_only() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static(" 5 "));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(5)));
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }

    #[tokio::test(start_paused = true)]
    async fn run_retries_server_errors_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let result = policy(3, 100)
            .run(|| {
                let seen = Arc::clone(&seen);
                async move {
                    if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(server_error())
                    } else {
                        Ok("page")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "page");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_returns_last_error_when_budget_is_spent() {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let result: Result<(), _> = policy(1, 100)
            .run(|| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err(ClientError::RateLimited { retry_after: None })
                }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(result, Err(ClientError::RateLimited { .. })));
    }
}
