//! Leaderboard views. Derived from the store, never persisted, cached by [`Scope`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{rank::Ranked, score::ScoreRecord};

// ─── Scope ───────────────────────────────────────────────────────────────────

/// The partition a view (and its cache entry) covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
  Global,
  Challenge(String),
}

impl Scope {
  pub const GLOBAL_KEY: &'static str = "global";

  /// `"global"` or `"challenge:<challenge_id>"`.
  pub fn cache_key(&self) -> String {
    match self {
      Self::Global => Self::GLOBAL_KEY.to_owned(),
      Self::Challenge(id) => format!("challenge:{id}"),
    }
  }

  /// Every key a committed write to `challenge_id` makes stale.
  pub fn affected_by_write(challenge_id: &str) -> [String; 2] {
    [Self::Challenge(challenge_id.to_owned()).cache_key(), Self::Global.cache_key()]
  }
}

// ─── Views ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
  pub user_id:      Uuid,
  pub username:     String,
  pub score:        i64,
  pub rank:         u32,
  pub last_updated: DateTime<Utc>,
}

impl LeaderboardEntry {
  /// Attach a display name to a ranked record. Users missing from `names`
  /// are shown by id.
  pub fn from_ranked(ranked: Ranked<ScoreRecord>, names: &HashMap<Uuid, String>) -> Self {
    let Ranked { rank, item } = ranked;
    let username = names
      .get(&item.user_id)
      .cloned()
      .unwrap_or_else(|| item.user_id.to_string());
    Self {
      user_id: item.user_id,
      username,
      score: item.score,
      rank,
      last_updated: item.last_updated,
    }
  }
}

/// Best score per user across all challenges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalLeaderboard {
  pub entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeLeaderboard {
  pub challenge_id: String,
  pub scores:       Vec<LeaderboardEntry>,
}

impl ChallengeLeaderboard {
  pub fn empty(challenge_id: impl Into<String>) -> Self {
    Self { challenge_id: challenge_id.into(), scores: Vec::new() }
  }

  pub fn rank_of(&self, user_id: Uuid) -> Option<u32> {
    self.scores.iter().find(|e| e.user_id == user_id).map(|e| e.rank)
  }
}

// ─── Per-user standing ───────────────────────────────────────────────────────

/// A user's current score and rank in one challenge, both read from the same
/// snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeStanding {
  pub challenge_id: String,
  pub score:        i64,
  pub rank:         u32,
  pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStanding {
  pub user_id:     Uuid,
  pub username:    String,
  /// Rank on the global board (best score per user). `None` once every
  /// record of the user has been purged.
  pub global_rank: Option<u32>,
  pub challenges:  Vec<ChallengeStanding>,
}
