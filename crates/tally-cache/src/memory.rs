use std::{
  collections::HashMap,
  time::{Duration, Instant},
};

use parking_lot::Mutex;
use tally_core::cache::{CacheError, LeaderboardCache};

struct Entry {
  value:      String,
  /// `None` when the TTL reaches past what `Instant` can represent.
  expires_at: Option<Instant>,
}

impl Entry {
  fn is_live(&self, now: Instant) -> bool { self.expires_at.is_none_or(|at| now < at) }
}

/// A process-local TTL cache.
///
/// Expired entries are dropped lazily on read, or eagerly by
/// [`purge_expired`](MemoryCache::purge_expired).
#[derive(Default)]
pub struct MemoryCache {
  entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
  pub fn new() -> Self { Self::default() }

  /// Number of stored entries, including expired ones not yet swept.
  pub fn len(&self) -> usize { self.entries.lock().len() }

  pub fn is_empty(&self) -> bool { self.entries.lock().is_empty() }

  /// Drop every expired entry; returns how many were removed.
  pub fn purge_expired(&self) -> usize {
    let now = Instant::now();
    let mut entries = self.entries.lock();
    let before = entries.len();
    entries.retain(|_, e| e.is_live(now));
    let removed = before - entries.len();
    if removed > 0 {
      tracing::debug!(removed, "swept expired cache entries");
    }
    removed
  }

  fn lookup(&self, key: &str) -> Option<String> {
    let now = Instant::now();
    let mut entries = self.entries.lock();
    match entries.get(key) {
      Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
      Some(_) => {}
      None => return None,
    }
    entries.remove(key);
    None
  }
}

impl LeaderboardCache for MemoryCache {
  async fn get(&self, key: &str) -> Result<Option<String>, CacheError> { Ok(self.lookup(key)) }

  async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
    let expires_at = Instant::now().checked_add(ttl);
    self
      .entries
      .lock()
      .insert(key.to_owned(), Entry { value, expires_at });
    Ok(())
  }

  async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
    self.entries.lock().remove(key);
    Ok(())
  }

  async fn invalidate_all(&self, keys: &[String]) -> Result<(), CacheError> {
    let mut entries = self.entries.lock();
    for key in keys {
      entries.remove(key);
    }
    Ok(())
  }
}

/// A cache that stores nothing. Every read is a miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl LeaderboardCache for NoCache {
  async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> { Ok(None) }

  async fn put(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
    Ok(())
  }

  async fn invalidate(&self, _key: &str) -> Result<(), CacheError> { Ok(()) }

  async fn invalidate_all(&self, _keys: &[String]) -> Result<(), CacheError> { Ok(()) }
}

#[cfg(test)]
mod tests {
  use super::*;

  const LONG: Duration = Duration::from_secs(60);

  #[tokio::test]
  async fn put_then_get() {
    let cache = MemoryCache::new();
    cache.put("global", "[1]".into(), LONG).await.unwrap();
    assert_eq!(cache.get("global").await.unwrap().as_deref(), Some("[1]"));
    assert!(cache.get("challenge:c1").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn put_overwrites() {
    let cache = MemoryCache::new();
    cache.put("global", "old".into(), LONG).await.unwrap();
    cache.put("global", "new".into(), LONG).await.unwrap();
    assert_eq!(cache.get("global").await.unwrap().as_deref(), Some("new"));
    assert_eq!(cache.len(), 1);
  }

  #[tokio::test]
  async fn expired_entries_miss_and_are_dropped() {
    let cache = MemoryCache::new();
    cache.put("global", "v".into(), Duration::from_millis(10)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(cache.get("global").await.unwrap().is_none());
    assert!(cache.is_empty());
  }

  #[tokio::test]
  async fn zero_ttl_never_hits() {
    let cache = MemoryCache::new();
    cache.put("global", "v".into(), Duration::ZERO).await.unwrap();
    assert!(cache.get("global").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn unrepresentable_ttl_never_expires() {
    let cache = MemoryCache::new();
    cache.put("global", "v".into(), Duration::from_secs(u64::MAX)).await.unwrap();
    cache.put("challenge:c1", "w".into(), Duration::MAX).await.unwrap();

    assert_eq!(cache.get("global").await.unwrap().as_deref(), Some("v"));
    assert_eq!(cache.get("challenge:c1").await.unwrap().as_deref(), Some("w"));
    assert_eq!(cache.purge_expired(), 0);

    cache.invalidate("global").await.unwrap();
    assert!(cache.get("global").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn invalidate_and_invalidate_all() {
    let cache = MemoryCache::new();
    for key in ["global", "challenge:a", "challenge:b"] {
      cache.put(key, "v".into(), LONG).await.unwrap();
    }

    cache.invalidate("challenge:a").await.unwrap();
    assert!(cache.get("challenge:a").await.unwrap().is_none());
    assert_eq!(cache.len(), 2);

    cache
      .invalidate_all(&["global".to_owned(), "challenge:b".to_owned(), "missing".to_owned()])
      .await
      .unwrap();
    assert!(cache.is_empty());
  }

  #[tokio::test]
  async fn purge_expired_keeps_live_entries() {
    let cache = MemoryCache::new();
    cache.put("short", "v".into(), Duration::from_millis(5)).await.unwrap();
    cache.put("long", "v".into(), LONG).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(cache.purge_expired(), 1);
    assert_eq!(cache.get("long").await.unwrap().as_deref(), Some("v"));
  }

  #[tokio::test]
  async fn no_cache_always_misses() {
    let cache = NoCache;
    cache.put("global", "v".into(), LONG).await.unwrap();
    assert!(cache.get("global").await.unwrap().is_none());
  }
}
