//! Rate-limits repeated schema-violation log lines to once per minute per
//! `(robot_id, stream, error_kind)` (§4.C), so a misbehaving robot can't
//! flood the log.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    window: Duration,
    last_logged: Mutex<HashMap<(String, String, String), Instant>>,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_logged: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` the first time a key is seen, and again each time the
    /// window has elapsed since the last `true`.
    pub fn should_log(&self, robot_id: &str, stream: &str, error_kind: &str) -> bool {
        let key = (robot_id.to_string(), stream.to_string(), error_kind.to_string());
        let mut last_logged = self.last_logged.lock().unwrap();
        match last_logged.get(&key) {
            Some(at) if at.elapsed() < self.window => false,
            _ => {
                last_logged.insert(key, Instant::now());
                true
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logs_first_occurrence_then_suppresses() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        assert!(limiter.should_log("RV-001", "sensors", "schema_rejected"));
        assert!(!limiter.should_log("RV-001", "sensors", "schema_rejected"));
    }

    #[test]
    fn distinct_keys_log_independently() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        assert!(limiter.should_log("RV-001", "sensors", "schema_rejected"));
        assert!(limiter.should_log("RV-002", "sensors", "schema_rejected"));
    }
}
