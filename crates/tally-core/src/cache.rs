//! The `LeaderboardCache` trait.
//!
//! Values are serialized leaderboard views keyed by
//! [`Scope::cache_key`](crate::leaderboard::Scope::cache_key). The cache is
//! best-effort: callers treat every [`CacheError`] as a miss.

use std::{future::Future, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
  #[error("cache unavailable: {0}")]
  Unavailable(String),
}

pub trait LeaderboardCache: Send + Sync {
  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<String>, CacheError>> + Send + 'a;

  fn put<'a>(
    &'a self,
    key: &'a str,
    value: String,
    ttl: Duration,
  ) -> impl Future<Output = Result<(), CacheError>> + Send + 'a;

  fn invalidate<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<(), CacheError>> + Send + 'a;

  fn invalidate_all<'a>(
    &'a self,
    keys: &'a [String],
  ) -> impl Future<Output = Result<(), CacheError>> + Send + 'a;
}
