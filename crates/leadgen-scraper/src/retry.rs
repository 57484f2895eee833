//! Retry with exponential back-off and jitter for Firecrawl requests.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Rate limits, network failures, and 5xx responses are transient. Anything
/// else (404, 4xx, bad JSON, upstream `success: false`) is returned as-is.
fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::RateLimited { .. } | ScraperError::Http(_) => true,
        ScraperError::UnexpectedStatus { status, .. } => *status >= 500,
        _ => false,
    }
}

/// Runs `operation`, retrying transient errors up to `max_retries` times.
///
/// | Attempt | Delay before attempt          |
/// |---------|-------------------------------|
/// | 1       | base × 2⁰ ± 25 % jitter       |
/// | 2       | base × 2¹ ± 25 % jitter       |
/// | 3       | base × 2² ± 25 % jitter       |
///
/// Delays are capped at 60 s.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient Firecrawl error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn rate_limited() -> ScraperError {
        ScraperError::RateLimited {
            domain: "api.firecrawl.dev".to_owned(),
            retry_after_secs: 0,
        }
    }

    async fn count_attempts(max_retries: u32, fail_times: u32, err: fn() -> ScraperError) -> (Result<u32, ScraperError>, u32) {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let result = retry_with_backoff(max_retries, 0, || {
            let c = Arc::clone(&c);
            async move {
                let n = c.fetch_add(1, Ordering::SeqCst);
                if n < fail_times {
                    Err(err())
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        (result, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn succeeds_immediately_on_first_try() {
        let (result, calls) = count_attempts(3, 0, rate_limited).await;
        assert_eq!(result.unwrap(), 0);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn retries_rate_limited_then_succeeds() {
        let (result, calls) = count_attempts(3, 2, rate_limited).await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let (result, calls) = count_attempts(2, u32::MAX, rate_limited).await;
        assert!(matches!(result, Err(ScraperError::RateLimited { .. })));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn retries_server_errors_but_not_client_errors() {
        let (result, calls) = count_attempts(3, 1, || ScraperError::UnexpectedStatus {
            status: 502,
            url: "u".to_owned(),
            preview: String::new(),
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls, 2);

        let (result, calls) = count_attempts(3, 1, || ScraperError::UnexpectedStatus {
            status: 402,
            url: "u".to_owned(),
            preview: String::new(),
        })
        .await;
        assert!(matches!(
            result,
            Err(ScraperError::UnexpectedStatus { status: 402, .. })
        ));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn does_not_retry_upstream_failure() {
        let (result, calls) = count_attempts(3, 1, || ScraperError::Upstream {
            url: "https://example.com".to_owned(),
            message: "blocked".to_owned(),
        })
        .await;
        assert!(matches!(result, Err(ScraperError::Upstream { .. })));
        assert_eq!(calls, 1);
    }
}
