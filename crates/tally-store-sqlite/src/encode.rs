//! Encoding and decoding helpers between Tally domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with exactly six fractional
//! digits and a `Z` suffix, so lexical comparison in SQL matches time order.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use tally_core::{challenge::Challenge, score::ScoreRecord, user::User};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// The current time at the precision the store keeps, so a record returned
/// from a write equals the same record read back later.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw column values of a `score_history` row.
pub struct RawScore {
  pub score_id:     String,
  pub challenge_id: String,
  pub user_id:      String,
  pub score:        i64,
  pub last_updated: String,
}

impl RawScore {
  /// Column order must match `score_id, challenge_id, user_id, score,
  /// last_updated`.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      score_id:     row.get(0)?,
      challenge_id: row.get(1)?,
      user_id:      row.get(2)?,
      score:        row.get(3)?,
      last_updated: row.get(4)?,
    })
  }

  pub fn into_record(self) -> Result<ScoreRecord> {
    Ok(ScoreRecord {
      score_id:     decode_uuid(&self.score_id)?,
      challenge_id: self.challenge_id,
      user_id:      decode_uuid(&self.user_id)?,
      score:        self.score,
      last_updated: decode_dt(&self.last_updated)?,
    })
  }
}

pub struct RawChallenge {
  pub challenge_id: String,
  pub created_at:   String,
}

impl RawChallenge {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { challenge_id: row.get(0)?, created_at: row.get(1)? })
  }

  pub fn into_challenge(self) -> Result<Challenge> {
    Ok(Challenge {
      challenge_id: self.challenge_id,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawUser {
  pub user_id:    String,
  pub username:   String,
  pub created_at: String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:    row.get(0)?,
      username:   row.get(1)?,
      created_at: row.get(2)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:    decode_uuid(&self.user_id)?,
      username:   self.username,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_are_fixed_width_and_sortable() {
    let a = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let b = a + chrono::Duration::microseconds(1500);

    let (ea, eb) = (encode_dt(a), encode_dt(b));
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }
}
