//! RateLimiter - token bucket bounding requests per second

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Token bucket with continuous refill.
///
/// Callers reserve a token under a fair mutex and then sleep until it is
/// theirs, so grants follow arrival order. The bucket may go negative; the
/// debt is what later callers wait out.
#[derive(Debug)]
pub struct RateLimiter {
    qps: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl RateLimiter {
    /// Limiter granting at most `qps` permits per second, spaced evenly
    pub fn new(qps: f64) -> Self {
        Self::with_burst(qps, 1.0)
    }

    /// Limiter whose bucket holds up to `burst` tokens (at least 1).
    ///
    /// `qps` must be finite and positive.
    pub fn with_burst(qps: f64, burst: f64) -> Self {
        let burst = burst.max(1.0);
        Self {
            qps,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: 1.0,
                refilled_at: Instant::now(),
            }),
        }
    }

    /// Configured rate
    pub fn qps(&self) -> f64 {
        self.qps
    }

    /// Wait until a permit can be granted without exceeding the rate
    pub async fn acquire(&self) {
        let wait = self.reserve().await;
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }

    async fn reserve(&self) -> Duration {
        let mut bucket = self.bucket.lock().await;
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.qps).min(self.burst);
        bucket.refilled_at = now;

        bucket.tokens -= 1.0;
        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            // tiny rates overflow Duration; tokio parks such sleeps indefinitely
            Duration::try_from_secs_f64(-bucket.tokens / self.qps).unwrap_or(Duration::MAX)
        }
    }
}
