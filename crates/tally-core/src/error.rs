//! Error taxonomy shared by every Tally crate.
//!
//! Backends keep their own error enums and convert into [`Error`] at a single
//! boundary. Cache failures have their own type
//! ([`CacheError`](crate::cache::CacheError)) because they never reach callers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The backing store is unreachable, erroring, or timed out. Retryable.
  #[error("store unavailable: {0}")]
  StoreUnavailable(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl Error {
  /// Whether the caller may retry the same request unchanged.
  pub fn is_retryable(&self) -> bool { matches!(self, Self::StoreUnavailable(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
