//! Sliding-window rate limiting
//!
//! Used for login (5 failures per username per 15 minutes, 10 attempts per IP
//! per minute) and for the public write endpoints (comments, newsletter).

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use tokio::sync::RwLock;

/// At most `limit` hits per `window` for each key
pub struct SlidingWindowLimiter<K> {
    limit: usize,
    window: Duration,
    hits: RwLock<HashMap<K, Vec<DateTime<Utc>>>>,
}

impl<K: Eq + Hash + Clone> SlidingWindowLimiter<K> {
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: RwLock::new(HashMap::new()),
        }
    }

    /// Whether `key` has used up its window
    pub async fn is_limited(&self, key: &K) -> bool {
        self.is_limited_at(key, Utc::now()).await
    }

    async fn is_limited_at(&self, key: &K, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.window;
        let mut hits = self.hits.write().await;
        match hits.get_mut(key) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= self.limit
            }
            None => false,
        }
    }

    pub async fn record(&self, key: K) {
        self.hits.write().await.entry(key).or_default().push(Utc::now());
    }

    /// Check and record in one step; returns false when already limited
    pub async fn try_acquire(&self, key: K) -> bool {
        if self.is_limited(&key).await {
            return false;
        }
        self.record(key).await;
        true
    }

    /// Seconds until the oldest hit in the window expires
    pub async fn retry_after(&self, key: &K) -> i64 {
        let hits = self.hits.read().await;
        hits.get(key)
            .and_then(|times| times.iter().min())
            .map(|oldest| (*oldest + self.window - Utc::now()).num_seconds().max(1))
            .unwrap_or(0)
    }

    pub async fn clear(&self, key: &K) {
        self.hits.write().await.remove(key);
    }

    /// Drop expired hits and empty keys
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        self.hits.write().await.retain(|_, times| {
            times.retain(|t| *t > cutoff);
            !times.is_empty()
        });
    }

    pub async fn tracked_keys(&self) -> usize {
        self.hits.read().await.len()
    }
}

/// Login protection: failures per username, attempts per IP
pub struct LoginRateLimiter {
    usernames: SlidingWindowLimiter<String>,
    ips: SlidingWindowLimiter<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            usernames: SlidingWindowLimiter::new(5, Duration::minutes(15)),
            ips: SlidingWindowLimiter::new(10, Duration::minutes(1)),
        }
    }

    pub async fn is_username_limited(&self, username: &str) -> bool {
        self.usernames.is_limited(&username.to_lowercase()).await
    }

    pub async fn record_failed_attempt(&self, username: &str) {
        self.usernames.record(username.to_lowercase()).await;
    }

    /// Successful login resets the username counter
    pub async fn clear_username_attempts(&self, username: &str) {
        self.usernames.clear(&username.to_lowercase()).await;
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        self.ips.is_limited(&ip).await
    }

    pub async fn record_ip_request(&self, ip: IpAddr) {
        self.ips.record(ip).await;
    }

    pub async fn ip_retry_after(&self, ip: IpAddr) -> i64 {
        self.ips.retry_after(&ip).await
    }

    pub async fn cleanup(&self) {
        self.usernames.cleanup().await;
        self.ips.cleanup().await;
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_username_rate_limit() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..4 {
            assert!(!limiter.is_username_limited("editor").await);
            limiter.record_failed_attempt("editor").await;
        }
        limiter.record_failed_attempt("editor").await;
        assert!(limiter.is_username_limited("editor").await);

        limiter.clear_username_attempts("editor").await;
        assert!(!limiter.is_username_limited("editor").await);
    }

    #[tokio::test]
    async fn test_ip_rate_limit_and_retry_after() {
        let limiter = LoginRateLimiter::new();
        let ip = IpAddr::from_str("127.0.0.1").unwrap();
        assert_eq!(limiter.ip_retry_after(ip).await, 0);

        for _ in 0..10 {
            assert!(!limiter.is_ip_limited(ip).await);
            limiter.record_ip_request(ip).await;
        }
        assert!(limiter.is_ip_limited(ip).await);

        let retry = limiter.ip_retry_after(ip).await;
        assert!((1..=60).contains(&retry));
    }

    #[tokio::test]
    async fn test_case_insensitive_username() {
        let limiter = LoginRateLimiter::new();
        limiter.record_failed_attempt("Owner").await;
        limiter.record_failed_attempt("owner").await;
        limiter.record_failed_attempt("OWNER").await;
        limiter.record_failed_attempt("owner").await;
        assert!(!limiter.is_username_limited("owner").await);
        limiter.record_failed_attempt("owner").await;
        assert!(limiter.is_username_limited("OwNeR").await);
    }

    #[tokio::test]
    async fn test_try_acquire_and_window_expiry() {
        let limiter: SlidingWindowLimiter<&str> = SlidingWindowLimiter::new(2, Duration::milliseconds(30));
        assert!(limiter.try_acquire("k").await);
        assert!(limiter.try_acquire("k").await);
        assert!(!limiter.try_acquire("k").await);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(limiter.try_acquire("k").await);
    }

    #[tokio::test]
    async fn test_cleanup_drops_stale_keys() {
        let limiter: SlidingWindowLimiter<u8> = SlidingWindowLimiter::new(3, Duration::milliseconds(10));
        limiter.record(1).await;
        limiter.record(2).await;
        assert_eq!(limiter.tracked_keys().await, 2);

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked_keys().await, 0);
    }
}
