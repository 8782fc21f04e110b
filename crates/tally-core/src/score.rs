//! Score records, the only data the store persists about play.
//!
//! Records are append-only. For each `(challenge_id, user_id)` pair the store
//! may hold many records; the *current* one is the highest score, with the
//! earliest `last_updated` winning ties.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted score. Never mutated after it is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
  pub score_id:     Uuid,
  pub challenge_id: String,
  pub user_id:      Uuid,
  pub score:        i64,
  /// Server-assigned write timestamp.
  pub last_updated: DateTime<Utc>,
}

/// Input to [`crate::store::ScoreStore::insert_score`] and
/// [`crate::store::ScoreStore::submit_if_higher`].
/// `last_updated` is always set by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewScore {
  pub challenge_id: String,
  pub user_id:      Uuid,
  pub score:        i64,
}

impl NewScore {
  pub fn new(challenge_id: impl Into<String>, user_id: Uuid, score: i64) -> Self {
    Self { challenge_id: challenge_id.into(), user_id, score }
  }
}

/// Result of the store's atomic "insert only if strictly higher" primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalWrite {
  /// The new score beat the current best (or there was none) and was
  /// committed.
  Inserted(ScoreRecord),
  /// The current best is greater than or equal to the submitted score.
  /// Nothing was written.
  Rejected { current: ScoreRecord },
}

impl ConditionalWrite {
  pub fn is_inserted(&self) -> bool { matches!(self, Self::Inserted(_)) }
}

/// Summary of an administrative purge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purge {
  pub removed:    u64,
  /// Challenges that lost at least one record, sorted and deduplicated.
  pub challenges: Vec<String>,
}

/// What a submitter learns about their submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
  pub accepted: bool,
  /// The submitted score when accepted; the standing best when rejected.
  pub score:    i64,
  /// Absent when rejected, or when the rank could not be computed after an
  /// accepted write.
  pub rank:     Option<u32>,
}
