//! In-process cache backends for serialized leaderboard views.
//!
//! [`MemoryCache`] is a TTL map guarded by a `parking_lot` mutex.
//! [`NoCache`] always misses and is used when caching is switched off.

mod memory;

pub use memory::{MemoryCache, NoCache};
