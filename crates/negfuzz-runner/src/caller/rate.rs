//! Shared token bucket limiting requests per minute
//!
//! The bucket starts full (`burst` tokens) and refills continuously at the
//! configured rate. Every worker calls [`RateLimiter::acquire`] before sending;
//! accounting happens under one lock, sleeping happens outside it.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// `None` when `per_minute` is 0, which would never admit a request.
    #[must_use]
    pub fn per_minute(per_minute: u32, burst: u32) -> Option<Self> {
        if per_minute == 0 {
            return None;
        }
        let burst = f64::from(burst.max(1));
        Some(Self {
            interval: Duration::from_secs(60) / per_minute,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Time between two admitted requests once the burst is spent.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until a token is available, then take it.
    pub fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock();
                self.refill(&mut bucket);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                self.interval.mul_f64(1.0 - bucket.tokens)
            };
            std::thread::sleep(wait);
        }
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill);
        let earned = elapsed.as_secs_f64() / self.interval.as_secs_f64();
        bucket.tokens = (bucket.tokens + earned).min(self.burst);
        bucket.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_is_rejected() {
        assert!(RateLimiter::per_minute(0, 1).is_none());
    }

    #[test]
    fn interval_from_rate() {
        let limiter = RateLimiter::per_minute(120, 1).unwrap();
        assert_eq!(limiter.interval(), Duration::from_millis(500));
    }

    #[test]
    fn burst_is_available_immediately() {
        let limiter = RateLimiter::per_minute(1, 3).unwrap();
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn acquire_waits_for_refill() {
        let limiter = RateLimiter::per_minute(600, 1).unwrap();
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire();
        }
        assert!(start.elapsed() >= Duration::from_millis(190));
    }

    #[test]
    fn shared_between_threads() {
        let limiter = RateLimiter::per_minute(1200, 1).unwrap();
        let start = Instant::now();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| limiter.acquire());
            }
        });
        assert!(start.elapsed() >= Duration::from_millis(140));
    }
}
