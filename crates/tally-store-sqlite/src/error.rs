//! Error type for `tally-store-sqlite`, and its mapping into the core
//! taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("username {0:?} is already taken")]
  UsernameTaken(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The one place backend failures are translated for callers. Anything that
/// is not a caller mistake means the store cannot serve the request.
impl From<Error> for tally_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::UsernameTaken(_) => tally_core::Error::Conflict(e.to_string()),
      other => tally_core::Error::StoreUnavailable(other.to_string()),
    }
  }
}
