//! Challenges: named scoring contexts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upper bound on challenge identifier length, in bytes.
pub const MAX_CHALLENGE_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
  pub challenge_id: String,
  pub created_at:   DateTime<Utc>,
}

/// Trim and check a caller-supplied challenge identifier.
pub fn validate_challenge_id(raw: &str) -> Result<&str> {
  let id = raw.trim();
  if id.is_empty() {
    return Err(Error::InvalidInput("challenge_id must not be empty".into()));
  }
  if id.len() > MAX_CHALLENGE_ID_LEN {
    return Err(Error::InvalidInput(format!(
      "challenge_id exceeds {MAX_CHALLENGE_ID_LEN} bytes"
    )));
  }
  Ok(id)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn trims_surrounding_whitespace() {
    assert_eq!(validate_challenge_id("  c1 ").unwrap(), "c1");
  }

  #[test]
  fn rejects_blank_and_oversized_ids() {
    assert!(matches!(validate_challenge_id("   "), Err(Error::InvalidInput(_))));
    let long = "x".repeat(MAX_CHALLENGE_ID_LEN + 1);
    assert!(matches!(validate_challenge_id(&long), Err(Error::InvalidInput(_))));
  }
}
