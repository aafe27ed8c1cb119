use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter per user.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    inner: Arc<RwLock<HashMap<String, Window>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    /// Count a request for `user_id`. Returns false when the user is over the limit.
    pub async fn check(&self, user_id: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.inner.write().await;
        windows.retain(|_, w| now.duration_since(w.started) < self.window);

        let window = windows
            .entry(user_id.to_string())
            .or_insert(Window { started: now, count: 0 });
        if window.count >= self.max_requests {
            tracing::warn!(user_id, "rate limit exceeded");
            return false;
        }
        window.count += 1;
        true
    }

    /// Number of users with an open window.
    pub async fn tracked_users(&self) -> usize {
        self.inner.read().await.len()
    }
}
