//! Rate limiter for login attempts
//!
//! Attempts are counted per normalized email. A successful login clears the
//! counter for that email.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of attempts allowed per window
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Ban duration in seconds
    pub ban_duration_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,        // 5 minutes
            ban_duration_seconds: 3600, // 1 hour
        }
    }
}

#[derive(Debug)]
struct RateLimiterEntry {
    attempts: u32,
    window_start: Instant,
    ban_expires: Option<Instant>,
}

/// Rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, RateLimiterEntry>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count an attempt for `key` and report whether it may proceed
    pub async fn is_allowed(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let entry = entries.entry(key.to_string()).or_insert(RateLimiterEntry {
            attempts: 0,
            window_start: now,
            ban_expires: None,
        });

        if let Some(ban_expires) = entry.ban_expires {
            if now < ban_expires {
                return false;
            }
            entry.attempts = 0;
            entry.ban_expires = None;
            entry.window_start = now;
        }

        if now.duration_since(entry.window_start) >= Duration::from_secs(self.config.window_seconds)
        {
            entry.attempts = 0;
            entry.window_start = now;
        }

        if entry.attempts >= self.config.max_attempts {
            entry.ban_expires = Some(now + Duration::from_secs(self.config.ban_duration_seconds));
            warn!(
                "Banned login key {} for {} seconds",
                key, self.config.ban_duration_seconds
            );
            return false;
        }

        entry.attempts += 1;
        true
    }

    /// Forget all attempts for `key`
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    /// Drop entries whose window and ban have both elapsed
    pub async fn prune(&self) {
        let now = Instant::now();
        let window = Duration::from_secs(self.config.window_seconds);
        self.entries.lock().await.retain(|_, entry| {
            entry.ban_expires.is_some_and(|ban| now < ban)
                || now.duration_since(entry.window_start) < window
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_attempts: u32, ban_duration_seconds: u64) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            max_attempts,
            window_seconds: 300,
            ban_duration_seconds,
        })
    }

    #[tokio::test]
    async fn test_bans_after_max_attempts() {
        let limiter = limiter(3, 3600);

        for _ in 0..3 {
            assert!(limiter.is_allowed("admin@vanityhub.com").await);
        }
        assert!(!limiter.is_allowed("admin@vanityhub.com").await);
        assert!(!limiter.is_allowed("admin@vanityhub.com").await);

        // other keys are unaffected
        assert!(limiter.is_allowed("sara@vanityhub.com").await);
    }

    #[tokio::test]
    async fn test_reset_clears_attempts() {
        let limiter = limiter(2, 3600);

        assert!(limiter.is_allowed("admin@vanityhub.com").await);
        assert!(limiter.is_allowed("admin@vanityhub.com").await);
        limiter.reset("admin@vanityhub.com").await;

        assert!(limiter.is_allowed("admin@vanityhub.com").await);
    }

    #[tokio::test]
    async fn test_elapsed_ban_is_lifted() {
        let limiter = limiter(1, 0);

        assert!(limiter.is_allowed("admin@vanityhub.com").await);
        assert!(!limiter.is_allowed("admin@vanityhub.com").await);
        assert!(limiter.is_allowed("admin@vanityhub.com").await);
    }

    #[tokio::test]
    async fn test_prune_keeps_active_entries() {
        let limiter = limiter(5, 3600);
        assert!(limiter.is_allowed("admin@vanityhub.com").await);

        limiter.prune().await;
        assert_eq!(limiter.entries.lock().await.len(), 1);
    }
}
