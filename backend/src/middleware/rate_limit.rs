use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Fixed-window lockout for credential endpoints. Keys are caller-chosen
/// (login email, peer address); a key that accumulates too many failures
/// inside the window is rejected until the window rolls over.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, FailureWindow>>,
    max_failures: usize,
    window: Duration,
}

struct FailureWindow {
    started: Instant,
    failures: usize,
}

impl RateLimiter {
    pub fn new(max_failures: usize, window_secs: u64) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_failures,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Whether a request under this key may proceed
    pub fn check(&self, key: &str) -> bool {
        let mut windows = self.windows.lock().unwrap();
        match windows.get(key) {
            Some(entry) if entry.started.elapsed() < self.window => {
                entry.failures < self.max_failures
            }
            Some(_) => {
                // Window rolled over
                windows.remove(key);
                true
            }
            None => true,
        }
    }

    /// Record a failed attempt for a key (call after failed login)
    pub fn record(&self, key: &str) {
        let mut windows = self.windows.lock().unwrap();
        let entry = windows.entry(key.to_string()).or_insert(FailureWindow {
            started: Instant::now(),
            failures: 0,
        });

        if entry.started.elapsed() >= self.window {
            entry.started = Instant::now();
            entry.failures = 0;
        }
        entry.failures += 1;
    }

    /// Forget a key entirely (e.g., after successful login)
    pub fn clear(&self, key: &str) {
        self.windows.lock().unwrap().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_allows_under_limit() {
        let limiter = RateLimiter::new(3, 60);

        assert!(limiter.check("a@acme.test"));
        limiter.record("a@acme.test");
        limiter.record("a@acme.test");
        assert!(limiter.check("a@acme.test"));
    }

    #[test]
    fn test_blocks_over_limit() {
        let limiter = RateLimiter::new(2, 60);

        limiter.record("a@acme.test");
        limiter.record("a@acme.test");
        assert!(!limiter.check("a@acme.test"));
    }

    #[test]
    fn test_window_rolls_over() {
        let limiter = RateLimiter::new(1, 1);

        limiter.record("a@acme.test");
        assert!(!limiter.check("a@acme.test"));

        sleep(Duration::from_secs(2));

        assert!(limiter.check("a@acme.test"));
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1, 60);

        limiter.record("a@acme.test");
        assert!(!limiter.check("a@acme.test"));
        assert!(limiter.check("b@acme.test"));
    }

    #[test]
    fn test_clear_resets_key() {
        let limiter = RateLimiter::new(1, 60);

        limiter.record("a@acme.test");
        assert!(!limiter.check("a@acme.test"));

        limiter.clear("a@acme.test");
        assert!(limiter.check("a@acme.test"));
    }
}
