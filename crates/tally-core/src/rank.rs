//! Ranking rules.
//!
//! Everything here is a pure function of a snapshot of current scores, so a
//! rank and the list it came from can never disagree.
//!
//! Order: higher score first; equal scores go to whoever reached them first
//! (earliest `last_updated`); `user_id` settles anything left so the order is
//! total. Ranks follow standard competition ranking: equal scores share a
//! rank and the next distinct score skips ahead (`1, 2, 2, 4`).

use std::{
  cmp::Ordering,
  collections::{HashMap, hash_map::Entry},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::score::ScoreRecord;

/// An item annotated with its 1-based rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranked<T> {
  pub rank: u32,
  pub item: T,
}

/// Leaderboard order. `Less` means `a` stands above `b`.
pub fn compare_standing(a: &ScoreRecord, b: &ScoreRecord) -> Ordering {
  b.score
    .cmp(&a.score)
    .then_with(|| a.last_updated.cmp(&b.last_updated))
    .then_with(|| a.user_id.cmp(&b.user_id))
}

pub fn sort_standings(records: &mut [ScoreRecord]) { records.sort_by(compare_standing); }

/// Sort `records` and assign competition ranks.
pub fn rank_standings(mut records: Vec<ScoreRecord>) -> Vec<Ranked<ScoreRecord>> {
  sort_standings(&mut records);

  let mut ranked: Vec<Ranked<ScoreRecord>> = Vec::with_capacity(records.len());
  for (idx, record) in records.into_iter().enumerate() {
    let position = idx as u32 + 1;
    let rank = match ranked.last() {
      Some(prev) if prev.item.score == record.score => prev.rank,
      _ => position,
    };
    ranked.push(Ranked { rank, item: record });
  }
  ranked
}

/// Look up a user's rank in an already-ranked list.
pub fn rank_of(ranked: &[Ranked<ScoreRecord>], user_id: Uuid) -> Option<u32> {
  ranked
    .iter()
    .find(|r| r.item.user_id == user_id)
    .map(|r| r.rank)
}

/// Collapse per-challenge records to each user's single best record.
///
/// This is the global aggregation: a user's global score is their best
/// current score in any challenge.
pub fn best_per_user(records: impl IntoIterator<Item = ScoreRecord>) -> Vec<ScoreRecord> {
  let mut best: HashMap<Uuid, ScoreRecord> = HashMap::new();
  for record in records {
    match best.entry(record.user_id) {
      Entry::Occupied(mut slot) => {
        if compare_standing(&record, slot.get()) == Ordering::Less {
          slot.insert(record);
        }
      }
      Entry::Vacant(slot) => {
        slot.insert(record);
      }
    }
  }
  best.into_values().collect()
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, Duration, TimeZone, Utc};

  use super::*;

  fn t0() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() }

  fn record(challenge: &str, user: Uuid, score: i64, offset_secs: i64) -> ScoreRecord {
    ScoreRecord {
      score_id:     Uuid::new_v4(),
      challenge_id: challenge.into(),
      user_id:      user,
      score,
      last_updated: t0() + Duration::seconds(offset_secs),
    }
  }

  #[test]
  fn competition_ranks_share_and_skip() {
    let records = vec![
      record("c1", Uuid::new_v4(), 90, 0),
      record("c1", Uuid::new_v4(), 80, 0),
      record("c1", Uuid::new_v4(), 100, 0),
      record("c1", Uuid::new_v4(), 90, 5),
    ];

    let ranked = rank_standings(records);
    let scores: Vec<i64> = ranked.iter().map(|r| r.item.score).collect();
    let ranks: Vec<u32> = ranked.iter().map(|r| r.rank).collect();

    assert_eq!(scores, [100, 90, 90, 80]);
    assert_eq!(ranks, [1, 2, 2, 4]);
  }

  #[test]
  fn earlier_timestamp_wins_the_tie_in_order() {
    let early = Uuid::new_v4();
    let late = Uuid::new_v4();
    let ranked = rank_standings(vec![
      record("c1", late, 50, 30),
      record("c1", early, 50, 10),
    ]);

    assert_eq!(ranked[0].item.user_id, early);
    assert_eq!(ranked[1].item.user_id, late);
    assert_eq!(ranked[0].rank, ranked[1].rank);
  }

  #[test]
  fn empty_snapshot_ranks_to_empty() {
    assert!(rank_standings(Vec::new()).is_empty());
  }

  #[test]
  fn rank_of_finds_user_or_none() {
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let ranked = rank_standings(vec![
      record("c1", alice, 100, 0),
      record("c1", bob, 90, 0),
    ]);

    assert_eq!(rank_of(&ranked, alice), Some(1));
    assert_eq!(rank_of(&ranked, bob), Some(2));
    assert_eq!(rank_of(&ranked, Uuid::new_v4()), None);
  }

  #[test]
  fn best_per_user_keeps_highest_across_challenges() {
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let best = best_per_user(vec![
      record("c1", alice, 40, 0),
      record("c2", alice, 70, 0),
      record("c1", bob, 55, 0),
    ]);

    assert_eq!(best.len(), 2);
    let alice_best = best.iter().find(|r| r.user_id == alice).unwrap();
    assert_eq!(alice_best.score, 70);
    assert_eq!(alice_best.challenge_id, "c2");
  }

  #[test]
  fn best_per_user_prefers_earliest_on_equal_scores() {
    let alice = Uuid::new_v4();
    let best = best_per_user(vec![
      record("c2", alice, 70, 20),
      record("c1", alice, 70, 10),
    ]);
    assert_eq!(best[0].challenge_id, "c1");
  }
}
