//! Users as seen by the leaderboard: an id and a display name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

pub const MAX_USERNAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:    Uuid,
  pub username:   String,
  pub created_at: DateTime<Utc>,
}

pub fn validate_username(raw: &str) -> Result<&str> {
  let name = raw.trim();
  if name.is_empty() {
    return Err(Error::InvalidInput("username must not be empty".into()));
  }
  if name.len() > MAX_USERNAME_LEN {
    return Err(Error::InvalidInput(format!(
      "username exceeds {MAX_USERNAME_LEN} bytes"
    )));
  }
  Ok(name)
}
