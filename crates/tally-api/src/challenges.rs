//! Handlers for `/challenges` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/challenges` | |
//! | `POST` | `/challenges` | Body: `{"challenge_id":"weekly-1"}`; idempotent |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tally_core::{
  cache::LeaderboardCache,
  challenge::Challenge,
  store::{ScoreStore, UserDirectory},
};
use tally_service::LeaderboardService;

use crate::{Data, error::ApiError};

/// `GET /challenges`
pub async fn list<S, C>(
  State(svc): State<LeaderboardService<S, C>>,
) -> Result<Json<Data<Vec<Challenge>>>, ApiError>
where
  S: ScoreStore + UserDirectory + 'static,
  C: LeaderboardCache + 'static,
{
  Ok(Data::json(svc.list_challenges().await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub challenge_id: String,
}

/// `POST /challenges`
pub async fn create<S, C>(
  State(svc): State<LeaderboardService<S, C>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ScoreStore + UserDirectory + 'static,
  C: LeaderboardCache + 'static,
{
  let challenge = svc.register_challenge(&body.challenge_id).await?;
  Ok((StatusCode::CREATED, Data::json(challenge)))
}
