//! Integration tests for `SqliteStore` against an in-memory database.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tally_core::{
  score::{ConditionalWrite, NewScore},
  store::{ScoreStore, UserDirectory},
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn score(challenge: &str, user: Uuid, value: i64) -> NewScore {
  NewScore::new(challenge, user, value)
}

// ─── Current score ───────────────────────────────────────────────────────────

#[tokio::test]
async fn current_score_missing_returns_none() {
  let s = store().await;
  let current = s.current_score("c1", Uuid::new_v4()).await.unwrap();
  assert!(current.is_none());
}

#[tokio::test]
async fn current_is_highest_not_latest() {
  let s = store().await;
  let user = Uuid::new_v4();

  s.insert_score(score("c1", user, 40)).await.unwrap();
  let best = s.insert_score(score("c1", user, 90)).await.unwrap();
  s.insert_score(score("c1", user, 60)).await.unwrap();

  let current = s.current_score("c1", user).await.unwrap().unwrap();
  assert_eq!(current, best);
}

#[tokio::test]
async fn current_prefers_earliest_of_equal_scores() {
  let s = store().await;
  let user = Uuid::new_v4();

  let first = s.insert_score(score("c1", user, 75)).await.unwrap();
  s.insert_score(score("c1", user, 75)).await.unwrap();

  let current = s.current_score("c1", user).await.unwrap().unwrap();
  assert_eq!(current.score_id, first.score_id);
}

// ─── Conditional write ───────────────────────────────────────────────────────

#[tokio::test]
async fn first_submission_is_inserted() {
  let s = store().await;
  let user = Uuid::new_v4();

  let outcome = s.submit_if_higher(score("c1", user, 10)).await.unwrap();
  let ConditionalWrite::Inserted(record) = outcome.clone() else {
    panic!("expected insert, got {outcome:?}");
  };
  assert_eq!(record.score, 10);
  assert_eq!(s.current_score("c1", user).await.unwrap(), Some(record));
}

#[tokio::test]
async fn equal_or_lower_submission_is_rejected_without_writing() {
  let s = store().await;
  let user = Uuid::new_v4();
  s.submit_if_higher(score("c1", user, 100)).await.unwrap();

  for value in [100, 80] {
    let outcome = s.submit_if_higher(score("c1", user, value)).await.unwrap();
    assert!(
      matches!(&outcome, ConditionalWrite::Rejected { current } if current.score == 100),
      "submitting {value}: {outcome:?}"
    );
  }

  // Only the original record exists in the user's history.
  let purge = s
    .purge_scores_after(user, Utc::now() - chrono::Duration::hours(1))
    .await
    .unwrap();
  assert_eq!(purge.removed, 1);
}

#[tokio::test]
async fn higher_submission_replaces_current() {
  let s = store().await;
  let user = Uuid::new_v4();
  s.submit_if_higher(score("c1", user, 100)).await.unwrap();

  let outcome = s.submit_if_higher(score("c1", user, 101)).await.unwrap();
  assert!(outcome.is_inserted());

  let current = s.current_score("c1", user).await.unwrap().unwrap();
  assert_eq!(current.score, 101);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_submissions_keep_the_maximum() {
  for _ in 0..20 {
    let s = Arc::new(store().await);
    let user = Uuid::new_v4();

    let a = tokio::spawn({
      let s = Arc::clone(&s);
      async move { s.submit_if_higher(score("c1", user, 50)).await }
    });
    let b = tokio::spawn({
      let s = Arc::clone(&s);
      async move { s.submit_if_higher(score("c1", user, 60)).await }
    });
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let current = s.current_score("c1", user).await.unwrap().unwrap();
    assert_eq!(current.score, 60);
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn write_is_stamped_when_it_reaches_the_connection() {
  let s = store().await;
  let user = Uuid::new_v4();

  // Occupy the connection thread so the submission queues behind it.
  let blocker = tokio::spawn({
    let conn = s.conn.clone();
    async move {
      conn
        .call(|_| {
          std::thread::sleep(Duration::from_millis(50));
          Ok(crate::encode::now())
        })
        .await
    }
  });
  tokio::time::sleep(Duration::from_millis(10)).await;

  let outcome = s.submit_if_higher(score("c1", user, 10)).await.unwrap();
  let released_at = blocker.await.unwrap().unwrap();

  let ConditionalWrite::Inserted(record) = outcome.clone() else {
    panic!("expected insert, got {outcome:?}");
  };
  assert!(
    record.last_updated >= released_at,
    "stamped {} before the connection was free at {released_at}",
    record.last_updated
  );
  assert_eq!(s.current_score("c1", user).await.unwrap(), Some(record));
}

#[tokio::test]
async fn monotonic_over_arbitrary_sequence() {
  let s = store().await;
  let user = Uuid::new_v4();
  let sequence = [5, 3, 9, 9, 1, 12, 7, 12, 4];

  let mut best = i64::MIN;
  for value in sequence {
    s.submit_if_higher(score("c1", user, value)).await.unwrap();
    best = best.max(value);
    let current = s.current_score("c1", user).await.unwrap().unwrap();
    assert_eq!(current.score, best);
  }
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn challenge_scores_lists_one_current_record_per_user() {
  let s = store().await;
  let alice = Uuid::new_v4();
  let bob = Uuid::new_v4();

  s.insert_score(score("c1", alice, 10)).await.unwrap();
  s.insert_score(score("c1", alice, 30)).await.unwrap();
  s.insert_score(score("c1", bob, 20)).await.unwrap();
  s.insert_score(score("c2", bob, 99)).await.unwrap();

  let mut rows = s.challenge_scores("c1").await.unwrap();
  rows.sort_by_key(|r| r.score);

  assert_eq!(rows.len(), 2);
  assert_eq!((rows[0].user_id, rows[0].score), (bob, 20));
  assert_eq!((rows[1].user_id, rows[1].score), (alice, 30));
}

#[tokio::test]
async fn user_scores_spans_challenges() {
  let s = store().await;
  let alice = Uuid::new_v4();

  s.insert_score(score("c1", alice, 10)).await.unwrap();
  s.insert_score(score("c2", alice, 20)).await.unwrap();
  s.insert_score(score("c2", alice, 15)).await.unwrap();
  s.insert_score(score("c2", Uuid::new_v4(), 50)).await.unwrap();

  let mut rows = s.user_scores(alice).await.unwrap();
  rows.sort_by(|a, b| a.challenge_id.cmp(&b.challenge_id));

  let summary: Vec<(&str, i64)> =
    rows.iter().map(|r| (r.challenge_id.as_str(), r.score)).collect();
  assert_eq!(summary, [("c1", 10), ("c2", 20)]);
}

#[tokio::test]
async fn all_current_scores_covers_every_pair() {
  let s = store().await;
  let alice = Uuid::new_v4();
  let bob = Uuid::new_v4();

  s.insert_score(score("c1", alice, 1)).await.unwrap();
  s.insert_score(score("c1", alice, 2)).await.unwrap();
  s.insert_score(score("c2", alice, 3)).await.unwrap();
  s.insert_score(score("c1", bob, 4)).await.unwrap();

  assert_eq!(s.all_current_scores().await.unwrap().len(), 3);
}

// ─── Purge ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn purge_removes_only_later_records_of_that_user() {
  let s = store().await;
  let alice = Uuid::new_v4();
  let bob = Uuid::new_v4();

  let kept = s.insert_score(score("c1", alice, 10)).await.unwrap();
  tokio::time::sleep(std::time::Duration::from_millis(5)).await;
  let cutoff = Utc::now();
  tokio::time::sleep(std::time::Duration::from_millis(5)).await;
  s.insert_score(score("c1", alice, 50)).await.unwrap();
  s.insert_score(score("c2", alice, 70)).await.unwrap();
  s.insert_score(score("c1", bob, 90)).await.unwrap();

  let purge = s.purge_scores_after(alice, cutoff).await.unwrap();
  assert_eq!(purge.removed, 2);
  assert_eq!(purge.challenges, ["c1", "c2"]);

  assert_eq!(s.current_score("c1", alice).await.unwrap(), Some(kept));
  assert!(s.current_score("c2", alice).await.unwrap().is_none());
  assert_eq!(s.current_score("c1", bob).await.unwrap().unwrap().score, 90);
}

#[tokio::test]
async fn purge_with_nothing_to_remove_reports_zero() {
  let s = store().await;
  let purge = s.purge_scores_after(Uuid::new_v4(), Utc::now()).await.unwrap();
  assert_eq!(purge.removed, 0);
  assert!(purge.challenges.is_empty());
}

// ─── Challenges ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_challenge_is_idempotent() {
  let s = store().await;

  let first = s.register_challenge("weekly").await.unwrap();
  let again = s.register_challenge("weekly").await.unwrap();
  assert_eq!(first, again);

  assert_eq!(s.list_challenges().await.unwrap().len(), 1);
}

#[tokio::test]
async fn first_score_registers_its_challenge() {
  let s = store().await;
  assert!(s.get_challenge("c1").await.unwrap().is_none());

  s.submit_if_higher(score("c1", Uuid::new_v4(), 1)).await.unwrap();

  let challenge = s.get_challenge("c1").await.unwrap().unwrap();
  assert_eq!(challenge.challenge_id, "c1");
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_and_get_user() {
  let s = store().await;

  let user = s.register_user("alice").await.unwrap();
  let fetched = s.get_user(user.user_id).await.unwrap().unwrap();
  assert_eq!(fetched, user);
  assert!(s.get_user(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
  let s = store().await;
  s.register_user("alice").await.unwrap();

  let err = s.register_user("alice").await.unwrap_err();
  assert!(matches!(err, tally_core::Error::Conflict(_)), "{err:?}");
}

#[tokio::test]
async fn usernames_skips_unknown_ids() {
  let s = store().await;
  let alice = s.register_user("alice").await.unwrap();
  let bob = s.register_user("bob").await.unwrap();
  let stranger = Uuid::new_v4();

  let names = s
    .usernames(&[alice.user_id, bob.user_id, stranger, alice.user_id])
    .await
    .unwrap();

  assert_eq!(names.len(), 2);
  assert_eq!(names[&alice.user_id], "alice");
  assert_eq!(names[&bob.user_id], "bob");
  assert!(s.usernames(&[]).await.unwrap().is_empty());
}
