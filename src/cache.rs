use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Clone, Debug)]
struct CacheEntry<V> {
    value: V,
    expiry: DateTime<Utc>,
}

/// In-memory cache with per-entry absolute expiry.
///
/// Expired entries are dropped lazily on the next read of their key; there is
/// no sweeper task, and distinct keys accumulate for the lifetime of the
/// process.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the live value for `key`, or run `fetch` and cache its result
    /// for `ttl_secs`.
    ///
    /// A failed fetch caches nothing, so the next caller retries the
    /// upstream. The fetch runs outside the lock: concurrent callers on a
    /// cold key may each hit the upstream, and the last write wins.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, ttl_secs: i64, fetch: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let now = Utc::now();
        {
            let mut entries = self.entries.lock().await;
            match entries.get(key) {
                Some(entry) if now < entry.expiry => {
                    debug!("Cache hit for {}", key);
                    return Ok(entry.value.clone());
                }
                Some(_) => {
                    entries.remove(key);
                }
                None => {}
            }
        }

        let value = fetch().await?;
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.clone(),
                expiry: Utc::now() + Duration::seconds(ttl_secs),
            },
        );
        Ok(value)
    }
}
