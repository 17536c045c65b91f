use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// Sliding-window rate limiter keyed by sender identity.
///
/// Each identity keeps the timestamps of its recent events, oldest first.
/// Timestamps older than the window are trimmed on every check; a rejected
/// event is not recorded. Identities are never evicted, so the map grows
/// with the number of distinct senders seen since startup.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<i64, VecDeque<i64>>>,
    window_seconds: i64,
    limit: usize,
}

impl RateLimiter {
    pub fn new(window_seconds: i64, limit: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window_seconds,
            limit,
        }
    }

    /// Record an event for `identity` if it is under the limit.
    pub async fn allow(&self, identity: i64) -> bool {
        self.allow_at(identity, Utc::now().timestamp()).await
    }

    async fn allow_at(&self, identity: i64, now: i64) -> bool {
        let mut windows = self.windows.lock().await;
        let events = windows.entry(identity).or_default();
        while events
            .front()
            .is_some_and(|first| now - first > self.window_seconds)
        {
            events.pop_front();
        }
        if events.len() >= self.limit {
            return false;
        }
        events.push_back(now);
        true
    }
}
