//! Handlers for `/users` endpoints.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use tally_core::{
  cache::LeaderboardCache,
  store::{ScoreStore, UserDirectory},
  user::User,
};
use tally_service::LeaderboardService;
use uuid::Uuid;

use crate::{Data, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub username: String,
}

/// `POST /users`: 409 if the username is taken.
pub async fn create<S, C>(
  State(svc): State<LeaderboardService<S, C>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ScoreStore + UserDirectory + 'static,
  C: LeaderboardCache + 'static,
{
  let user = svc.register_user(&body.username).await?;
  Ok((StatusCode::CREATED, Data::json(user)))
}

/// `GET /users/{id}`
pub async fn get_one<S, C>(
  State(svc): State<LeaderboardService<S, C>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Data<User>>, ApiError>
where
  S: ScoreStore + UserDirectory + 'static,
  C: LeaderboardCache + 'static,
{
  Ok(Data::json(svc.get_user(id).await?))
}
