//! Rate Limiter (Token Bucket Algorithm)
//!
//! Caps the request rate of the whole RPC surface.

use std::time::Instant;
use tokio::sync::Mutex;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket shared by every method handler
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    burst: u32,
    per_sec: u32,
}

impl RateLimiter {
    /// `burst` tokens up front, refilled at `per_sec` tokens per second
    pub fn new(burst: u32, per_sec: u32) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                tokens: burst as f64,
                last_refill: Instant::now(),
            }),
            burst,
            per_sec,
        }
    }

    /// Consume one token. Returns false when the caller should be throttled.
    pub async fn check(&self) -> bool {
        let mut bucket = self.bucket.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.per_sec as f64).min(self.burst as f64);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub async fn remaining(&self) -> u32 {
        self.bucket.lock().await.tokens.floor() as u32
    }
}
