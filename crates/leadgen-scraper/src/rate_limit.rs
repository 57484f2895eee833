//! Token-bucket limiter shared by every outbound scraping request.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Admits at most `max_tokens` requests as a burst, then one more per
/// `refill_interval`.
///
/// The bucket lock is held while a caller sleeps for its token, so waiters
/// are admitted one at a time in arrival order and the cap holds no matter
/// how many tasks share the limiter.
#[derive(Debug)]
pub struct RateLimiter {
    max_tokens: u32,
    refill_interval: Duration,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

impl RateLimiter {
    /// # Panics
    ///
    /// Panics if `max_tokens` is zero or `refill_interval` is zero; both
    /// would make the limiter either never admit or never throttle.
    #[must_use]
    pub fn new(max_tokens: u32, refill_interval: Duration) -> Self {
        assert!(max_tokens > 0, "rate limiter needs at least one token");
        assert!(
            !refill_interval.is_zero(),
            "rate limiter refill interval must be non-zero"
        );
        Self {
            max_tokens,
            refill_interval,
            bucket: Mutex::new(Bucket {
                tokens: max_tokens,
                last_refill: Instant::now(),
            }),
        }
    }

    #[must_use]
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    #[must_use]
    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    /// Waits until a token is available and takes it.
    pub async fn wait_if_needed(&self) {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket, Instant::now());

        if bucket.tokens == 0 {
            let next_token_at = bucket.last_refill + self.refill_interval;
            let wait = next_token_at.saturating_duration_since(Instant::now());
            tracing::debug!(wait_ms = wait.as_millis(), "rate limit reached, waiting");
            tokio::time::sleep_until(next_token_at).await;
            self.refill(&mut bucket, Instant::now());
        }

        bucket.tokens = bucket.tokens.saturating_sub(1);
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        if bucket.tokens == self.max_tokens {
            // A full bucket does not bank idle time.
            bucket.last_refill = now;
            return;
        }
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let earned = elapsed.as_nanos() / self.refill_interval.as_nanos();
        if earned == 0 {
            return;
        }
        let earned = u32::try_from(earned).unwrap_or(u32::MAX);
        bucket.tokens = bucket.tokens.saturating_add(earned).min(self.max_tokens);
        if bucket.tokens == self.max_tokens {
            // A full bucket does not bank partial intervals.
            bucket.last_refill = now;
        } else {
            bucket.last_refill += self.refill_interval * earned;
        }
    }
}
