//! Per-client fixed-window rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Tracked entries above this trigger a sweep of expired windows.
const EVICTION_THRESHOLD: usize = 1024;

/// One client's current window.
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of a rate-limit check, with the values the standard
/// `RateLimit-*` response headers need.
#[derive(Debug, Clone, Copy)]
pub struct Verdict {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: Duration,
}

/// Fixed-window limiter: at most `max_requests` per client per window.
///
/// State is scoped to one route; each configured route owns an independent
/// limiter even for the same client. The increment and the rollover check
/// happen under a single lock so concurrent requests from one client can
/// never overshoot the limit.
pub struct FixedWindowLimiter {
    window: Duration,
    max_requests: u32,
    clients: Mutex<HashMap<IpAddr, Window>>,
}

impl FixedWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_seconds),
            max_requests: config.max_requests,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request from `client` and decide whether it may proceed.
    pub fn check(&self, client: IpAddr) -> Verdict {
        let now = Instant::now();
        let mut clients = self.clients.lock().expect("rate limiter mutex poisoned");

        if clients.len() > EVICTION_THRESHOLD {
            let window = self.window;
            clients.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = clients.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        let reset_after = self.window.saturating_sub(now.duration_since(entry.started));
        if entry.count < self.max_requests {
            entry.count += 1;
            Verdict {
                allowed: true,
                limit: self.max_requests,
                remaining: self.max_requests - entry.count,
                reset_after,
            }
        } else {
            Verdict {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                reset_after,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limiter(window_seconds: u64, max_requests: u32) -> FixedWindowLimiter {
        FixedWindowLimiter::new(RateLimitConfig {
            window_seconds,
            max_requests,
        })
    }

    fn client(n: u8) -> IpAddr {
        IpAddr::from([127, 0, 0, n])
    }

    #[test]
    fn test_limit_enforced_within_window() {
        let limiter = limiter(60, 2);
        assert!(limiter.check(client(1)).allowed);
        assert!(limiter.check(client(1)).allowed);
        let verdict = limiter.check(client(1));
        assert!(!verdict.allowed);
        assert_eq!(verdict.remaining, 0);
        assert_eq!(verdict.limit, 2);
    }

    #[test]
    fn test_clients_tracked_independently() {
        let limiter = limiter(60, 1);
        assert!(limiter.check(client(1)).allowed);
        assert!(limiter.check(client(2)).allowed);
        assert!(!limiter.check(client(1)).allowed);
    }

    #[test]
    fn test_window_rollover_resets_count() {
        let limiter = FixedWindowLimiter {
            window: Duration::from_millis(50),
            max_requests: 1,
            clients: Mutex::new(HashMap::new()),
        };
        assert!(limiter.check(client(1)).allowed);
        assert!(!limiter.check(client(1)).allowed);
        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.check(client(1)).allowed);
    }

    #[test]
    fn test_remaining_counts_down() {
        let limiter = limiter(60, 3);
        assert_eq!(limiter.check(client(1)).remaining, 2);
        assert_eq!(limiter.check(client(1)).remaining, 1);
        assert_eq!(limiter.check(client(1)).remaining, 0);
        assert!(!limiter.check(client(1)).allowed);
    }

    #[test]
    fn test_no_overshoot_under_concurrency() {
        let limiter = Arc::new(limiter(60, 100));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = limiter.clone();
            handles.push(std::thread::spawn(move || {
                let mut allowed = 0u32;
                for _ in 0..50 {
                    if limiter.check(client(1)).allowed {
                        allowed += 1;
                    }
                }
                allowed
            }));
        }
        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 100, "exactly the limit must be admitted");
    }
}
