//! Handlers for `/leaderboard` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/leaderboard/global` | Optional `?limit=n` |
//! | `GET`    | `/leaderboard/challenge/{challenge_id}` | Optional `?limit=n`; 404 if unknown |
//! | `POST`   | `/leaderboard/score` | Body: `{"challenge_id":"c1","user_id":"…","score":100}` |
//! | `POST`   | `/leaderboard/challenge/{challenge_id}/score` | Body: `{"user_id":"…","score":100}` |
//! | `DELETE` | `/leaderboard/score` | `?user_id=…&date=…`; removes records after `date` |
//! | `GET`    | `/leaderboard/users/{user_id}` | 404 if the user has no records and no profile |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_core::{
  cache::LeaderboardCache,
  leaderboard::{ChallengeLeaderboard, GlobalLeaderboard, UserStanding},
  score::SubmissionOutcome,
  store::{ScoreStore, UserDirectory},
};
use tally_service::LeaderboardService;
use uuid::Uuid;

use crate::{Data, error::ApiError};

// ─── Reads ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LimitParams {
  pub limit: Option<usize>,
}

/// `GET /leaderboard/global[?limit=<n>]`
pub async fn global<S, C>(
  State(svc): State<LeaderboardService<S, C>>,
  Query(params): Query<LimitParams>,
) -> Result<Json<Data<GlobalLeaderboard>>, ApiError>
where
  S: ScoreStore + UserDirectory + 'static,
  C: LeaderboardCache + 'static,
{
  let mut board = svc.global_leaderboard().await?;
  if let Some(limit) = params.limit {
    board.entries.truncate(limit);
  }
  Ok(Data::json(board))
}

/// `GET /leaderboard/challenge/{challenge_id}[?limit=<n>]`
pub async fn challenge<S, C>(
  State(svc): State<LeaderboardService<S, C>>,
  Path(challenge_id): Path<String>,
  Query(params): Query<LimitParams>,
) -> Result<Json<Data<ChallengeLeaderboard>>, ApiError>
where
  S: ScoreStore + UserDirectory + 'static,
  C: LeaderboardCache + 'static,
{
  let mut board = svc.challenge_leaderboard(&challenge_id).await?;
  if let Some(limit) = params.limit {
    board.scores.truncate(limit);
  }
  Ok(Data::json(board))
}

/// `GET /leaderboard/users/{user_id}`
pub async fn standing<S, C>(
  State(svc): State<LeaderboardService<S, C>>,
  Path(user_id): Path<Uuid>,
) -> Result<Json<Data<UserStanding>>, ApiError>
where
  S: ScoreStore + UserDirectory + 'static,
  C: LeaderboardCache + 'static,
{
  Ok(Data::json(svc.user_standing(user_id).await?))
}

// ─── Submit ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
  pub challenge_id: String,
  pub user_id:      Uuid,
  pub score:        i64,
}

#[derive(Debug, Deserialize)]
pub struct ChallengeSubmitBody {
  pub user_id: Uuid,
  pub score:   i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
  pub success:  bool,
  pub message:  String,
  pub accepted: bool,
  pub score:    i64,
  pub rank:     Option<u32>,
}

impl From<SubmissionOutcome> for SubmitResponse {
  fn from(outcome: SubmissionOutcome) -> Self {
    let message = if outcome.accepted {
      "Score updated successfully"
    } else {
      "Score not higher than current best"
    };
    Self {
      success:  true,
      message:  message.to_owned(),
      accepted: outcome.accepted,
      score:    outcome.score,
      rank:     outcome.rank,
    }
  }
}

/// `POST /leaderboard/score`
pub async fn submit<S, C>(
  State(svc): State<LeaderboardService<S, C>>,
  Json(body): Json<SubmitBody>,
) -> Result<Json<SubmitResponse>, ApiError>
where
  S: ScoreStore + UserDirectory + 'static,
  C: LeaderboardCache + 'static,
{
  let outcome = svc
    .submit_score(&body.challenge_id, body.user_id, body.score)
    .await?;
  Ok(Json(outcome.into()))
}

/// `POST /leaderboard/challenge/{challenge_id}/score`
pub async fn submit_to_challenge<S, C>(
  State(svc): State<LeaderboardService<S, C>>,
  Path(challenge_id): Path<String>,
  Json(body): Json<ChallengeSubmitBody>,
) -> Result<Json<SubmitResponse>, ApiError>
where
  S: ScoreStore + UserDirectory + 'static,
  C: LeaderboardCache + 'static,
{
  let outcome = svc
    .submit_score(&challenge_id, body.user_id, body.score)
    .await?;
  Ok(Json(outcome.into()))
}

// ─── Purge ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PurgeParams {
  pub user_id: Uuid,
  pub date:    String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurgeResponse {
  pub success: bool,
  pub removed: u64,
}

/// `DELETE /leaderboard/score?user_id=<uuid>&date=<timestamp>`
pub async fn purge<S, C>(
  State(svc): State<LeaderboardService<S, C>>,
  Query(params): Query<PurgeParams>,
) -> Result<Json<PurgeResponse>, ApiError>
where
  S: ScoreStore + UserDirectory + 'static,
  C: LeaderboardCache + 'static,
{
  let after = parse_cutoff(&params.date)?;
  let removed = svc.purge_user_scores(params.user_id, after).await?;
  Ok(Json(PurgeResponse { success: true, removed }))
}

/// Accepts RFC 3339, or a naive ISO 8601 date-time or date taken as UTC.
fn parse_cutoff(raw: &str) -> Result<DateTime<Utc>, ApiError> {
  let raw = raw.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Ok(dt.with_timezone(&Utc));
  }
  if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
    return Ok(naive.and_utc());
  }
  NaiveDate::parse_from_str(raw, "%Y-%m-%d")
    .ok()
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .map(|naive| naive.and_utc())
    .ok_or_else(|| ApiError::BadRequest(format!("unrecognised date {raw:?}")))
}
