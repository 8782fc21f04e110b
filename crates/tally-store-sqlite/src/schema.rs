//! SQL schema for the Tally SQLite store.
//!
//! Executed once at connection startup; versioned through
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS challenges (
    challenge_id TEXT PRIMARY KEY,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    user_id    TEXT PRIMARY KEY,
    username   TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

-- Append-only. The administrative purge is the only DELETE.
-- user_id is not a foreign key: scores may belong to users the directory
-- does not know.
CREATE TABLE IF NOT EXISTS score_history (
    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
    score_id     TEXT NOT NULL UNIQUE,
    challenge_id TEXT NOT NULL REFERENCES challenges(challenge_id),
    user_id      TEXT NOT NULL,
    score        INTEGER NOT NULL,
    last_updated TEXT NOT NULL   -- RFC 3339 UTC, fixed microsecond width
);

CREATE INDEX IF NOT EXISTS score_pair_idx
    ON score_history(challenge_id, user_id, score DESC, last_updated);
CREATE INDEX IF NOT EXISTS score_user_idx
    ON score_history(user_id, last_updated);

PRAGMA user_version = 1;
";

const SCORE_COLUMNS: &str = "score_id, challenge_id, user_id, score, last_updated";

/// Select current records (best score per `(challenge, user)`, earliest
/// write on ties) from the rows matching `filter`.
pub fn current_scores_sql(filter: &str) -> String {
  format!(
    "SELECT {SCORE_COLUMNS} FROM (
       SELECT {SCORE_COLUMNS},
              ROW_NUMBER() OVER (
                PARTITION BY challenge_id, user_id
                ORDER BY score DESC, last_updated ASC, seq ASC
              ) AS pos
       FROM score_history
       {filter}
     )
     WHERE pos = 1"
  )
}

/// The current record for one `(challenge, user)` pair.
pub const CURRENT_FOR_PAIR: &str = "
SELECT score_id, challenge_id, user_id, score, last_updated
FROM score_history
WHERE challenge_id = ?1 AND user_id = ?2
ORDER BY score DESC, last_updated ASC, seq ASC
LIMIT 1";
