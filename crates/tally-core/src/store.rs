//! The `ScoreStore` and `UserDirectory` traits.
//!
//! Implemented by storage backends (e.g. `tally-store-sqlite`). The service
//! layer depends on these abstractions, not on any concrete backend.
//!
//! Backends map their own failures into [`crate::Error`] at one boundary;
//! connectivity problems must surface as
//! [`Error::StoreUnavailable`](crate::Error::StoreUnavailable).

use std::{collections::HashMap, future::Future};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  Result,
  challenge::Challenge,
  score::{ConditionalWrite, NewScore, Purge, ScoreRecord},
  user::User,
};

// ─── ScoreStore ──────────────────────────────────────────────────────────────

/// Durable, authoritative table of score records.
///
/// Writes are append-only; the only deletion is the administrative
/// [`purge_scores_after`](ScoreStore::purge_scores_after). Every list method
/// returns *current* records only: one per `(challenge, user)`, the highest
/// score with the earliest timestamp winning ties.
pub trait ScoreStore: Send + Sync {
  // ── Scores ────────────────────────────────────────────────────────────

  /// The current record for `(challenge_id, user_id)`, if any.
  fn current_score<'a>(
    &'a self,
    challenge_id: &'a str,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<ScoreRecord>>> + Send + 'a;

  /// Append a record unconditionally. Registers the challenge if it is new.
  fn insert_score(
    &self,
    input: NewScore,
  ) -> impl Future<Output = Result<ScoreRecord>> + Send + '_;

  /// Atomically insert `input` only if it is strictly greater than the
  /// current best for its `(challenge, user)`.
  ///
  /// The read and the insert must not be separable by a concurrent write to
  /// the same pair; two racing submissions of 50 and 60 always leave 60.
  fn submit_if_higher(
    &self,
    input: NewScore,
  ) -> impl Future<Output = Result<ConditionalWrite>> + Send + '_;

  /// Current records in one challenge, one per user. Unordered.
  fn challenge_scores<'a>(
    &'a self,
    challenge_id: &'a str,
  ) -> impl Future<Output = Result<Vec<ScoreRecord>>> + Send + 'a;

  /// Current records for one user, one per challenge. Unordered.
  fn user_scores(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ScoreRecord>>> + Send + '_;

  /// Current records for every `(challenge, user)` pair.
  fn all_current_scores(
    &self,
  ) -> impl Future<Output = Result<Vec<ScoreRecord>>> + Send + '_;

  /// Delete every record of `user_id` written strictly after `after`.
  fn purge_scores_after(
    &self,
    user_id: Uuid,
    after: DateTime<Utc>,
  ) -> impl Future<Output = Result<Purge>> + Send + '_;

  // ── Challenges ────────────────────────────────────────────────────────

  /// Register a challenge. Idempotent: returns the existing row if present.
  fn register_challenge<'a>(
    &'a self,
    challenge_id: &'a str,
  ) -> impl Future<Output = Result<Challenge>> + Send + 'a;

  fn get_challenge<'a>(
    &'a self,
    challenge_id: &'a str,
  ) -> impl Future<Output = Result<Option<Challenge>>> + Send + 'a;

  fn list_challenges(&self) -> impl Future<Output = Result<Vec<Challenge>>> + Send + '_;
}

// ─── UserDirectory ───────────────────────────────────────────────────────────

/// Resolves user ids to display names.
pub trait UserDirectory: Send + Sync {
  /// Create a user. Fails with [`Error::Conflict`](crate::Error::Conflict)
  /// if the username is taken.
  fn register_user<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<User>> + Send + 'a;

  fn get_user(&self, user_id: Uuid) -> impl Future<Output = Result<Option<User>>> + Send + '_;

  /// Batch lookup. Unknown ids are simply absent from the map.
  fn usernames<'a>(
    &'a self,
    user_ids: &'a [Uuid],
  ) -> impl Future<Output = Result<HashMap<Uuid, String>>> + Send + 'a;
}
