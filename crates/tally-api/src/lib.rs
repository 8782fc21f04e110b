//! HTTP layer for Tally.
//!
//! Exposes an axum [`Router`] over a [`LeaderboardService`], plus the
//! [`ServerConfig`] the `tally-server` binary reads at startup. Read
//! endpoints wrap their payload as `{"success": true, "data": …}`; failures
//! are `{"success": false, "error": "…"}` with a status from [`ApiError`].

pub mod challenges;
pub mod error;
pub mod leaderboard;
pub mod users;

use std::{path::PathBuf, time::Duration};

use axum::{
  Json, Router,
  routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tally_core::{
  cache::LeaderboardCache,
  store::{ScoreStore, UserDirectory},
};
use tally_service::{LeaderboardService, ServiceConfig};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `TALLY_*` environment variables. Every field has a default.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  /// When false, every read goes to the store.
  pub cache_enabled:    bool,
  pub cache_ttl_secs:   u64,
  pub store_timeout_ms: u64,
  pub cache_timeout_ms: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    let service = ServiceConfig::default();
    Self {
      host:             "127.0.0.1".to_string(),
      port:             8080,
      store_path:       PathBuf::from("tally.db"),
      cache_enabled:    true,
      cache_ttl_secs:   service.cache_ttl.as_secs(),
      store_timeout_ms: service.store_timeout.as_millis() as u64,
      cache_timeout_ms: service.cache_timeout.as_millis() as u64,
    }
  }
}

impl ServerConfig {
  pub fn service_config(&self) -> ServiceConfig {
    ServiceConfig {
      cache_ttl:     Duration::from_secs(self.cache_ttl_secs),
      store_timeout: Duration::from_millis(self.store_timeout_ms),
      cache_timeout: Duration::from_millis(self.cache_timeout_ms),
    }
  }
}

// ─── Responses ────────────────────────────────────────────────────────────────

/// Success envelope for read endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct Data<T> {
  pub success: bool,
  pub data:    T,
}

impl<T> Data<T> {
  pub fn json(data: T) -> Json<Self> { Json(Self { success: true, data }) }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full API router for `service`.
pub fn router<S, C>(service: LeaderboardService<S, C>) -> Router
where
  S: ScoreStore + UserDirectory + 'static,
  C: LeaderboardCache + 'static,
{
  Router::new()
    .route("/health", get(health))
    // Leaderboards
    .route("/leaderboard/global", get(leaderboard::global::<S, C>))
    .route("/leaderboard/challenge/{challenge_id}", get(leaderboard::challenge::<S, C>))
    .route(
      "/leaderboard/challenge/{challenge_id}/score",
      post(leaderboard::submit_to_challenge::<S, C>),
    )
    .route(
      "/leaderboard/score",
      post(leaderboard::submit::<S, C>).delete(leaderboard::purge::<S, C>),
    )
    .route("/leaderboard/users/{user_id}", get(leaderboard::standing::<S, C>))
    // Registries
    .route("/challenges", get(challenges::list::<S, C>).post(challenges::create::<S, C>))
    .route("/users", post(users::create::<S, C>))
    .route("/users/{id}", get(users::get_one::<S, C>))
    .with_state(service)
    .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

// ─── Tests ────────────────────────────────────────────────────────────────────
