//! Per-caller request throttle
//!
//! Keyed fixed-window limiter: one claim request per key per TTL. This is a
//! front-end politeness layer only; correctness against duplicate claims is
//! enforced by the orchestrator's locks and the store's conditional commit.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    ttl: Duration,
    last_seen: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Record a request for `key`. `Err` carries the time left in the
    /// current window.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut last_seen = self
            .last_seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        last_seen.retain(|_, seen| now.duration_since(*seen) < self.ttl);

        if let Some(seen) = last_seen.get(key) {
            let elapsed = now.duration_since(*seen);
            if elapsed < self.ttl {
                return Err(self.ttl - elapsed);
            }
        }

        last_seen.insert(key.to_string(), now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_passes() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        assert!(limiter.check("rAbc").is_ok());
    }

    #[test]
    fn test_second_request_within_window_is_limited() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        assert!(limiter.check("rAbc").is_ok());
        let remaining = limiter.check("rAbc").unwrap_err();
        assert!(remaining <= Duration::from_secs(10));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        assert!(limiter.check("rAbc").is_ok());
        assert!(limiter.check("rXyz").is_ok());
    }

    #[test]
    fn test_window_expiry_readmits() {
        let limiter = RateLimiter::new(Duration::from_millis(0));
        assert!(limiter.check("rAbc").is_ok());
        assert!(limiter.check("rAbc").is_ok());
    }
}
