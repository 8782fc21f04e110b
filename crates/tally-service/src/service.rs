use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use tally_core::{
  Error, Result,
  cache::{CacheError, LeaderboardCache},
  challenge::{Challenge, validate_challenge_id},
  leaderboard::{
    ChallengeLeaderboard, ChallengeStanding, GlobalLeaderboard, LeaderboardEntry, Scope,
    UserStanding,
  },
  rank::{Ranked, best_per_user, rank_of, rank_standings},
  score::{ConditionalWrite, NewScore, ScoreRecord, SubmissionOutcome},
  store::{ScoreStore, UserDirectory},
  user::{User, validate_username},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct ServiceConfig {
  /// Lifetime of every cached view.
  pub cache_ttl:     Duration,
  /// Upper bound on one store call; exceeding it is `StoreUnavailable`.
  pub store_timeout: Duration,
  /// Upper bound on one cache call; exceeding it is a miss.
  pub cache_timeout: Duration,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      cache_ttl:     Duration::from_secs(60),
      store_timeout: Duration::from_secs(5),
      cache_timeout: Duration::from_millis(250),
    }
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// The leaderboard core. Cheap to clone; all clones share one store, one
/// cache and one set of invalidation generations.
pub struct LeaderboardService<S, C> {
  store:       Arc<S>,
  cache:       Arc<C>,
  config:      ServiceConfig,
  /// Per cache key, bumped before every invalidation. A rebuild only writes
  /// its view back if the generation it started under is still current.
  generations: Arc<Mutex<HashMap<String, u64>>>,
}

impl<S, C> Clone for LeaderboardService<S, C> {
  fn clone(&self) -> Self {
    Self {
      store:       Arc::clone(&self.store),
      cache:       Arc::clone(&self.cache),
      config:      self.config,
      generations: Arc::clone(&self.generations),
    }
  }
}

impl<S, C> LeaderboardService<S, C>
where
  S: ScoreStore + UserDirectory + 'static,
  C: LeaderboardCache + 'static,
{
  pub fn new(store: Arc<S>, cache: Arc<C>, config: ServiceConfig) -> Self {
    Self { store, cache, config, generations: Arc::default() }
  }

  pub fn config(&self) -> &ServiceConfig { &self.config }

  // ── Reads ─────────────────────────────────────────────────────────────────

  pub async fn global_leaderboard(&self) -> Result<GlobalLeaderboard> {
    self
      .read_through(&Scope::Global, || self.build_global_view())
      .await
  }

  /// Fails with `NotFound` if the challenge was never registered or scored.
  pub async fn challenge_leaderboard(&self, challenge_id: &str) -> Result<ChallengeLeaderboard> {
    let challenge_id = validate_challenge_id(challenge_id)?;
    self
      .read_through(&Scope::Challenge(challenge_id.to_owned()), || {
        self.build_challenge_view(challenge_id)
      })
      .await
  }

  /// The user's score and rank in every challenge they have a record in.
  /// Each rank comes from a fresh snapshot of that challenge.
  pub async fn user_standing(&self, user_id: Uuid) -> Result<UserStanding> {
    let user = self.store_call("get_user", self.store.get_user(user_id)).await?;
    let records = self
      .store_call("user_scores", self.store.user_scores(user_id))
      .await?;

    if user.is_none() && records.is_empty() {
      return Err(Error::NotFound(format!("user {user_id}")));
    }

    let everyone = self
      .store_call("all_current_scores", self.store.all_current_scores())
      .await?;
    let global_rank = rank_of(&rank_standings(best_per_user(everyone)), user_id);

    let mut challenges = Vec::with_capacity(records.len());
    for record in records {
      let ranked = self.ranked_challenge(&record.challenge_id).await?;
      // Absent only if a purge landed between the two reads.
      if let Some(Ranked { rank, item }) = ranked.into_iter().find(|r| r.item.user_id == user_id) {
        challenges.push(ChallengeStanding {
          challenge_id: item.challenge_id,
          score: item.score,
          rank,
          last_updated: item.last_updated,
        });
      }
    }
    challenges.sort_by(|a, b| a.challenge_id.cmp(&b.challenge_id));

    let username = user.map_or_else(|| user_id.to_string(), |u| u.username);
    Ok(UserStanding { user_id, username, global_rank, challenges })
  }

  // ── View builder ──────────────────────────────────────────────────────────

  /// Build the global view straight from the store, bypassing the cache.
  pub async fn build_global_view(&self) -> Result<GlobalLeaderboard> {
    let records = self
      .store_call("all_current_scores", self.store.all_current_scores())
      .await?;
    let ranked = rank_standings(best_per_user(records));
    Ok(GlobalLeaderboard { entries: self.attach_usernames(ranked).await? })
  }

  /// Build one challenge's view straight from the store, bypassing the
  /// cache.
  pub async fn build_challenge_view(&self, challenge_id: &str) -> Result<ChallengeLeaderboard> {
    let challenge = self
      .store_call("get_challenge", self.store.get_challenge(challenge_id))
      .await?;
    if challenge.is_none() {
      return Err(Error::NotFound(format!("challenge {challenge_id:?}")));
    }

    let ranked = self.ranked_challenge(challenge_id).await?;
    Ok(ChallengeLeaderboard {
      challenge_id: challenge_id.to_owned(),
      scores:       self.attach_usernames(ranked).await?,
    })
  }

  async fn ranked_challenge(&self, challenge_id: &str) -> Result<Vec<Ranked<ScoreRecord>>> {
    let records = self
      .store_call("challenge_scores", self.store.challenge_scores(challenge_id))
      .await?;
    Ok(rank_standings(records))
  }

  async fn attach_usernames(
    &self,
    ranked: Vec<Ranked<ScoreRecord>>,
  ) -> Result<Vec<LeaderboardEntry>> {
    let ids: Vec<Uuid> = ranked.iter().map(|r| r.item.user_id).collect();
    let names = self.store_call("usernames", self.store.usernames(&ids)).await?;
    Ok(
      ranked
        .into_iter()
        .map(|r| LeaderboardEntry::from_ranked(r, &names))
        .collect(),
    )
  }

  // ── Submissions ───────────────────────────────────────────────────────────

  /// Submit a score. Only a strictly higher score than the current best is
  /// written; anything else is a normal rejection, not an error.
  ///
  /// The write and its cache invalidation run on a detached task: once
  /// started they finish even if the caller goes away.
  pub async fn submit_score(
    &self,
    challenge_id: &str,
    user_id: Uuid,
    score: i64,
  ) -> Result<SubmissionOutcome> {
    let input = NewScore::new(validate_challenge_id(challenge_id)?, user_id, score);

    let this = self.clone();
    let write = tokio::spawn(async move { this.commit_submission(input).await })
      .await
      .map_err(|e| Error::Internal(format!("submission task failed: {e}")))??;

    match write {
      ConditionalWrite::Rejected { current } => {
        debug!(
          challenge_id = %current.challenge_id,
          %user_id,
          submitted = score,
          current = current.score,
          "submission rejected"
        );
        Ok(SubmissionOutcome { accepted: false, score: current.score, rank: None })
      }
      ConditionalWrite::Inserted(record) => {
        let rank = match self.ranked_challenge(&record.challenge_id).await {
          Ok(ranked) => rank_of(&ranked, user_id),
          Err(e) => {
            warn!(
              challenge_id = %record.challenge_id,
              %user_id,
              error = %e,
              "rank computation failed after committed write"
            );
            None
          }
        };
        Ok(SubmissionOutcome { accepted: true, score: record.score, rank })
      }
    }
  }

  async fn commit_submission(&self, input: NewScore) -> Result<ConditionalWrite> {
    let write = self
      .store_call("submit_if_higher", self.store.submit_if_higher(input))
      .await?;

    if let ConditionalWrite::Inserted(record) = &write {
      info!(
        challenge_id = %record.challenge_id,
        user_id = %record.user_id,
        score = record.score,
        "score accepted"
      );
      self
        .invalidate(&Scope::affected_by_write(&record.challenge_id))
        .await;
    }
    Ok(write)
  }

  // ── Administration ────────────────────────────────────────────────────────

  /// Delete every record of `user_id` written after `after`. Returns the
  /// number of records removed.
  pub async fn purge_user_scores(&self, user_id: Uuid, after: DateTime<Utc>) -> Result<u64> {
    let this = self.clone();
    tokio::spawn(async move {
      let purge = this
        .store_call("purge_scores_after", this.store.purge_scores_after(user_id, after))
        .await?;

      if purge.removed > 0 {
        let keys: Vec<String> = purge
          .challenges
          .iter()
          .map(|c| Scope::Challenge(c.clone()).cache_key())
          .chain(std::iter::once(Scope::Global.cache_key()))
          .collect();
        this.invalidate(&keys).await;
      }
      Ok::<_, Error>(purge.removed)
    })
    .await
    .map_err(|e| Error::Internal(format!("purge task failed: {e}")))?
  }

  pub async fn register_challenge(&self, challenge_id: &str) -> Result<Challenge> {
    let challenge_id = validate_challenge_id(challenge_id)?;
    self
      .store_call("register_challenge", self.store.register_challenge(challenge_id))
      .await
  }

  pub async fn list_challenges(&self) -> Result<Vec<Challenge>> {
    self
      .store_call("list_challenges", self.store.list_challenges())
      .await
  }

  pub async fn register_user(&self, username: &str) -> Result<User> {
    let username = validate_username(username)?;
    self
      .store_call("register_user", self.store.register_user(username))
      .await
  }

  pub async fn get_user(&self, user_id: Uuid) -> Result<User> {
    self
      .store_call("get_user", self.store.get_user(user_id))
      .await?
      .ok_or_else(|| Error::NotFound(format!("user {user_id}")))
  }

  // ── Plumbing ──────────────────────────────────────────────────────────────

  /// Cache-first read of the view for `scope`.
  async fn read_through<V, F, Fut>(&self, scope: &Scope, build: F) -> Result<V>
  where
    V: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V>>,
  {
    let key = scope.cache_key();
    let generation = self.generation(&key);

    // `None` here means the cache itself failed, not a miss.
    let cached = self.cache_call("get", self.cache.get(&key)).await;
    let cache_healthy = cached.is_some();

    if let Some(Some(payload)) = cached {
      match serde_json::from_str::<V>(&payload) {
        Ok(view) => {
          debug!(key, "cache hit");
          return Ok(view);
        }
        Err(e) => {
          warn!(key, error = %e, "discarding undecodable cached view");
          self.cache_call("invalidate", self.cache.invalidate(&key)).await;
        }
      }
    } else {
      debug!(key, "cache miss");
    }

    let view = build().await?;

    if cache_healthy && self.generation(&key) == generation {
      match serde_json::to_string(&view) {
        Ok(payload) => {
          self
            .cache_call("put", self.cache.put(&key, payload, self.config.cache_ttl))
            .await;
          // A write committed while the put was in flight; its invalidation
          // may already have run, so evict what we just stored.
          if self.generation(&key) != generation {
            debug!(key, "view went stale during cache fill");
            self.cache_call("invalidate", self.cache.invalidate(&key)).await;
          }
        }
        Err(e) => warn!(key, error = %e, "failed to serialise view for cache"),
      }
    }
    Ok(view)
  }

  fn generation(&self, key: &str) -> u64 {
    self.generations.lock().get(key).copied().unwrap_or(0)
  }

  /// Retire every cached view under `keys`. Generations move first so that
  /// no rebuild started earlier can write its view back afterwards.
  async fn invalidate(&self, keys: &[String]) {
    {
      let mut generations = self.generations.lock();
      for key in keys {
        *generations.entry(key.clone()).or_insert(0) += 1;
      }
    }
    self
      .cache_call("invalidate_all", self.cache.invalidate_all(keys))
      .await;
  }

  async fn store_call<T>(
    &self,
    op: &'static str,
    call: impl Future<Output = Result<T>>,
  ) -> Result<T> {
    tokio::time::timeout(self.config.store_timeout, call)
      .await
      .unwrap_or_else(|_| {
        Err(Error::StoreUnavailable(format!(
          "{op} timed out after {:?}",
          self.config.store_timeout
        )))
      })
  }

  /// Run a cache call, absorbing failures. `None` means the call failed or
  /// timed out.
  async fn cache_call<T>(
    &self,
    op: &'static str,
    call: impl Future<Output = Result<T, CacheError>>,
  ) -> Option<T> {
    match tokio::time::timeout(self.config.cache_timeout, call).await {
      Ok(Ok(value)) => Some(value),
      Ok(Err(e)) => {
        warn!(op, error = %e, "cache call failed");
        None
      }
      Err(_) => {
        warn!(op, timeout = ?self.config.cache_timeout, "cache call timed out");
        None
      }
    }
  }
}
