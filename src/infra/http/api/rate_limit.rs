use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ApiRateLimitSettings;

/// Sliding-window limiter keyed by API key name and route.
#[derive(Debug, Clone)]
pub struct ApiRateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<String, Vec<Instant>>>,
}

impl ApiRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
        }
    }

    pub fn from_settings(settings: &ApiRateLimitSettings) -> Self {
        Self::new(
            Duration::from_secs(u64::from(settings.window_seconds.get())),
            settings.max_requests.get(),
        )
    }

    /// Record a request and report whether it fits in the window, together
    /// with the number of requests still available afterwards.
    pub fn allow(&self, key: &str, route: &str) -> (bool, u32) {
        let bucket_key = format!("{key}:{route}");
        let now = Instant::now();
        let window = self.window;

        let mut entry = self.buckets.entry(bucket_key).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        let used = u32::try_from(entry.len()).unwrap_or(u32::MAX);
        let remaining = self.max_requests.saturating_sub(used);
        if remaining == 0 {
            return (false, 0);
        }

        entry.push(now);
        (true, remaining - 1)
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_limit_within_window() {
        let limiter = ApiRateLimiter::new(Duration::from_secs(60), 2);

        assert_eq!(limiter.allow("ops", "/predict"), (true, 1));
        assert_eq!(limiter.allow("ops", "/predict"), (true, 0));
        assert_eq!(limiter.allow("ops", "/predict"), (false, 0));
        assert_eq!(limiter.retry_after_secs(), 60);
    }

    #[test]
    fn buckets_are_per_key_and_route() {
        let limiter = ApiRateLimiter::new(Duration::from_secs(60), 1);

        assert!(limiter.allow("ops", "/predict").0);
        assert!(limiter.allow("ops", "/predict/batch").0);
        assert!(limiter.allow("frontend", "/predict").0);
        assert!(!limiter.allow("ops", "/predict").0);
    }

    #[test]
    fn window_expiry_frees_slots() {
        let limiter = ApiRateLimiter::new(Duration::from_millis(20), 1);

        assert!(limiter.allow("ops", "/predict").0);
        assert!(!limiter.allow("ops", "/predict").0);
        std::thread::sleep(Duration::from_millis(40));
        assert!(limiter.allow("ops", "/predict").0);
        assert_eq!(limiter.retry_after_secs(), 1);
    }
}
