//! The SQLite implementation of [`ScoreStore`] and
//! [`UserDirectory`].
//!
//! Inherent methods speak this crate's [`Error`]; the trait impls at the
//! bottom are the single point where it is converted into
//! [`tally_core::Error`].

use std::{collections::HashMap, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tally_core::{
  challenge::Challenge,
  score::{ConditionalWrite, NewScore, Purge, ScoreRecord},
  store::{ScoreStore, UserDirectory},
  user::User,
};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{RawChallenge, RawScore, RawUser, decode_uuid, encode_dt, encode_uuid, now},
  schema::{CURRENT_FOR_PAIR, SCHEMA, current_scores_sql},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tally store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Every call
/// runs on the connection's own thread, one at a time.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Scores ────────────────────────────────────────────────────────────────

  async fn fetch_current(
    &self,
    challenge_id: String,
    user_id:      Uuid,
  ) -> Result<Option<ScoreRecord>> {
    let user_id_str = encode_uuid(user_id);

    let raw: Option<RawScore> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              CURRENT_FOR_PAIR,
              rusqlite::params![challenge_id, user_id_str],
              RawScore::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawScore::into_record).transpose()
  }

  async fn append(&self, input: NewScore) -> Result<ScoreRecord> {
    let row = RowValues::of(&input);
    let score_id = row.score_id;

    let written_at: DateTime<Utc> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let at = row.insert(&tx)?;
        tx.commit()?;
        Ok(at)
      })
      .await?;

    Ok(row_record(score_id, input, written_at))
  }

  async fn conditional_append(&self, input: NewScore) -> Result<ConditionalWrite> {
    let row = RowValues::of(&input);
    let score_id = row.score_id;

    let attempt: Attempt = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = tx
          .query_row(
            CURRENT_FOR_PAIR,
            rusqlite::params![row.challenge_id, row.user_id],
            RawScore::from_row,
          )
          .optional()?;

        if let Some(current) = current.filter(|c| c.score >= row.score) {
          return Ok(Attempt::Refused(current));
        }

        let at = row.insert(&tx)?;
        tx.commit()?;
        Ok(Attempt::Written(at))
      })
      .await?;

    match attempt {
      Attempt::Refused(raw) => {
        let current = raw.into_record()?;
        tracing::debug!(
          challenge_id = %current.challenge_id,
          user_id = %current.user_id,
          current = current.score,
          submitted = input.score,
          "conditional write refused"
        );
        Ok(ConditionalWrite::Rejected { current })
      }
      Attempt::Written(at) => Ok(ConditionalWrite::Inserted(row_record(score_id, input, at))),
    }
  }

  async fn fetch_current_where(
    &self,
    filter: &'static str,
    params: Vec<String>,
  ) -> Result<Vec<ScoreRecord>> {
    let sql = current_scores_sql(filter);

    let raws: Vec<RawScore> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawScore::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawScore::into_record).collect()
  }

  async fn delete_after(&self, user_id: Uuid, after: DateTime<Utc>) -> Result<Purge> {
    let user_id_str = encode_uuid(user_id);
    let after_str   = encode_dt(after);

    let (removed, challenges): (usize, Vec<String>) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let challenges = {
          let mut stmt = tx.prepare(
            "SELECT DISTINCT challenge_id FROM score_history
             WHERE user_id = ?1 AND last_updated > ?2
             ORDER BY challenge_id",
          )?;
          stmt
            .query_map(rusqlite::params![user_id_str, after_str], |r| r.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?
        };

        let removed = tx.execute(
          "DELETE FROM score_history WHERE user_id = ?1 AND last_updated > ?2",
          rusqlite::params![user_id_str, after_str],
        )?;

        tx.commit()?;
        Ok((removed, challenges))
      })
      .await?;

    tracing::info!(%user_id, %after, removed, "purged scores");
    Ok(Purge { removed: removed as u64, challenges })
  }

  // ── Challenges ────────────────────────────────────────────────────────────

  async fn upsert_challenge(&self, challenge_id: String) -> Result<Challenge> {
    let at_str = encode_dt(now());

    let raw: RawChallenge = self
      .conn
      .call(move |conn| {
        ensure_challenge(conn, &challenge_id, &at_str)?;
        Ok(conn.query_row(
          "SELECT challenge_id, created_at FROM challenges WHERE challenge_id = ?1",
          rusqlite::params![challenge_id],
          RawChallenge::from_row,
        )?)
      })
      .await?;

    raw.into_challenge()
  }

  async fn fetch_challenge(&self, challenge_id: String) -> Result<Option<Challenge>> {
    let raw: Option<RawChallenge> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT challenge_id, created_at FROM challenges WHERE challenge_id = ?1",
              rusqlite::params![challenge_id],
              RawChallenge::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawChallenge::into_challenge).transpose()
  }

  async fn fetch_challenges(&self) -> Result<Vec<Challenge>> {
    let raws: Vec<RawChallenge> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT challenge_id, created_at FROM challenges ORDER BY challenge_id",
        )?;
        let rows = stmt
          .query_map([], RawChallenge::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawChallenge::into_challenge).collect()
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn insert_user(&self, username: String) -> Result<User> {
    let user = User {
      user_id:    Uuid::new_v4(),
      username,
      created_at: now(),
    };

    let id_str   = encode_uuid(user.user_id);
    let name     = user.username.clone();
    let at_str   = encode_dt(user.created_at);

    let created: bool = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let taken = tx
          .query_row(
            "SELECT 1 FROM users WHERE username = ?1",
            rusqlite::params![name],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Ok(false);
        }
        tx.execute(
          "INSERT INTO users (user_id, username, created_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, name, at_str],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !created {
      return Err(Error::UsernameTaken(user.username));
    }
    Ok(user)
  }

  async fn fetch_user(&self, user_id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(user_id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id, username, created_at FROM users WHERE user_id = ?1",
              rusqlite::params![id_str],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn fetch_usernames(&self, user_ids: &[Uuid]) -> Result<HashMap<Uuid, String>> {
    let mut ids: Vec<String> = user_ids.iter().copied().map(encode_uuid).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
      return Ok(HashMap::new());
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql =
      format!("SELECT user_id, username FROM users WHERE user_id IN ({placeholders})");

    let rows: Vec<(String, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(ids.iter()), |r| {
            Ok((r.get(0)?, r.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(id, name)| Ok::<_, Error>((decode_uuid(&id)?, name)))
      .collect()
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

/// Outcome of a conditional write inside its transaction.
enum Attempt {
  Refused(RawScore),
  Written(DateTime<Utc>),
}

/// Owned column values for one `score_history` insert, movable into a
/// connection closure. The timestamp is taken at insert time.
struct RowValues {
  score_id:     Uuid,
  challenge_id: String,
  user_id:      String,
  score:        i64,
}

impl RowValues {
  fn of(input: &NewScore) -> Self {
    Self {
      score_id:     Uuid::new_v4(),
      challenge_id: input.challenge_id.clone(),
      user_id:      encode_uuid(input.user_id),
      score:        input.score,
    }
  }

  /// Register the challenge if needed, then append the row stamped with the
  /// current time. Must run on the connection thread, inside the write's
  /// transaction, so timestamp order follows commit order.
  fn insert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<DateTime<Utc>> {
    let at = now();
    let at_str = encode_dt(at);
    ensure_challenge(conn, &self.challenge_id, &at_str)?;
    conn.execute(
      "INSERT INTO score_history (score_id, challenge_id, user_id, score, last_updated)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      rusqlite::params![
        encode_uuid(self.score_id),
        self.challenge_id,
        self.user_id,
        self.score,
        at_str,
      ],
    )?;
    Ok(at)
  }
}

fn row_record(score_id: Uuid, input: NewScore, last_updated: DateTime<Utc>) -> ScoreRecord {
  ScoreRecord {
    score_id,
    challenge_id: input.challenge_id,
    user_id: input.user_id,
    score: input.score,
    last_updated,
  }
}

fn ensure_challenge(
  conn:         &rusqlite::Connection,
  challenge_id: &str,
  created_at:   &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT OR IGNORE INTO challenges (challenge_id, created_at) VALUES (?1, ?2)",
    rusqlite::params![challenge_id, created_at],
  )?;
  Ok(())
}

// ─── ScoreStore impl ─────────────────────────────────────────────────────────

impl ScoreStore for SqliteStore {
  async fn current_score(
    &self,
    challenge_id: &str,
    user_id: Uuid,
  ) -> tally_core::Result<Option<ScoreRecord>> {
    Ok(self.fetch_current(challenge_id.to_owned(), user_id).await?)
  }

  async fn insert_score(&self, input: NewScore) -> tally_core::Result<ScoreRecord> {
    Ok(self.append(input).await?)
  }

  async fn submit_if_higher(&self, input: NewScore) -> tally_core::Result<ConditionalWrite> {
    Ok(self.conditional_append(input).await?)
  }

  async fn challenge_scores(&self, challenge_id: &str) -> tally_core::Result<Vec<ScoreRecord>> {
    Ok(
      self
        .fetch_current_where("WHERE challenge_id = ?1", vec![challenge_id.to_owned()])
        .await?,
    )
  }

  async fn user_scores(&self, user_id: Uuid) -> tally_core::Result<Vec<ScoreRecord>> {
    Ok(
      self
        .fetch_current_where("WHERE user_id = ?1", vec![encode_uuid(user_id)])
        .await?,
    )
  }

  async fn all_current_scores(&self) -> tally_core::Result<Vec<ScoreRecord>> {
    Ok(self.fetch_current_where("", Vec::new()).await?)
  }

  async fn purge_scores_after(
    &self,
    user_id: Uuid,
    after: DateTime<Utc>,
  ) -> tally_core::Result<Purge> {
    Ok(self.delete_after(user_id, after).await?)
  }

  async fn register_challenge(&self, challenge_id: &str) -> tally_core::Result<Challenge> {
    Ok(self.upsert_challenge(challenge_id.to_owned()).await?)
  }

  async fn get_challenge(&self, challenge_id: &str) -> tally_core::Result<Option<Challenge>> {
    Ok(self.fetch_challenge(challenge_id.to_owned()).await?)
  }

  async fn list_challenges(&self) -> tally_core::Result<Vec<Challenge>> {
    Ok(self.fetch_challenges().await?)
  }
}

// ─── UserDirectory impl ──────────────────────────────────────────────────────

impl UserDirectory for SqliteStore {
  async fn register_user(&self, username: &str) -> tally_core::Result<User> {
    Ok(self.insert_user(username.to_owned()).await?)
  }

  async fn get_user(&self, user_id: Uuid) -> tally_core::Result<Option<User>> {
    Ok(self.fetch_user(user_id).await?)
  }

  async fn usernames(&self, user_ids: &[Uuid]) -> tally_core::Result<HashMap<Uuid, String>> {
    Ok(self.fetch_usernames(user_ids).await?)
  }
}
