//! Leaderboard orchestration over any [`ScoreStore`] and
//! [`LeaderboardCache`].
//!
//! [`LeaderboardService`] owns three flows:
//!
//! - **Reads** go through the cache. A miss (or any cache failure) rebuilds
//!   the view from the store, ranks it, and repopulates the cache when the
//!   cache is healthy.
//! - **Submissions** use the store's atomic conditional write, invalidate the
//!   affected views only after a confirmed commit, and then rank the
//!   submitter against a fresh snapshot.
//! - **Purges** delete a user's records after a timestamp and invalidate
//!   every view they touched.
//!
//! Every store call is bounded by [`ServiceConfig::store_timeout`] and every
//! cache call by [`ServiceConfig::cache_timeout`].
//!
//! [`ScoreStore`]: tally_core::store::ScoreStore
//! [`LeaderboardCache`]: tally_core::cache::LeaderboardCache

mod service;

pub use service::{LeaderboardService, ServiceConfig};
