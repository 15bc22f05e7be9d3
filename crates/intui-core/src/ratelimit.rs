//! Per-user token bucket guarding the completion API.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::domain::UserId;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after: Duration },
}

#[derive(Clone, Debug)]
struct Bucket {
    tokens: f64,
    last_update: Instant,
}

#[derive(Clone, Debug)]
pub struct RateLimiter {
    enabled: bool,
    capacity: f64,
    refill_per_sec: f64,
    window: Duration,
    buckets: HashMap<UserId, Bucket>,
    last_sweep: Option<Instant>,
}

impl RateLimiter {
    /// `requests` per `window`, refilled continuously.
    pub fn new(enabled: bool, requests: u32, window: Duration) -> Self {
        let capacity = f64::from(requests.max(1));
        Self {
            enabled,
            capacity,
            refill_per_sec: capacity / window.as_secs_f64().max(1e-9),
            window,
            buckets: HashMap::new(),
            last_sweep: None,
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, 1, Duration::from_secs(1))
    }

    pub fn check(&mut self, user_id: UserId) -> RateDecision {
        self.check_at(user_id, Instant::now())
    }

    pub fn check_at(&mut self, user_id: UserId, now: Instant) -> RateDecision {
        if !self.enabled {
            return RateDecision::Allowed;
        }

        match self.last_sweep {
            Some(at) if now.saturating_duration_since(at) < self.window => {}
            Some(_) => self.sweep(now),
            None => self.last_sweep = Some(now),
        }

        let capacity = self.capacity;
        let bucket = self.buckets.entry(user_id).or_insert(Bucket {
            tokens: capacity,
            last_update: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_update).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(capacity);
        bucket.last_update = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return RateDecision::Allowed;
        }

        let secs = (1.0 - bucket.tokens) / self.refill_per_sec;
        RateDecision::Limited {
            retry_after: Duration::from_secs_f64(secs.max(0.0)),
        }
    }

    /// Forget buckets that have refilled completely; a fresh bucket is identical.
    fn sweep(&mut self, now: Instant) {
        let (capacity, rate) = (self.capacity, self.refill_per_sec);
        self.buckets.retain(|_, b| {
            let idle = now.saturating_duration_since(b.last_update).as_secs_f64();
            b.tokens + idle * rate < capacity
        });
        self.last_sweep = Some(now);
    }
}
