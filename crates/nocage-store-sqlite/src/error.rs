//! Error type for `nocage-store-sqlite`.

use nocage_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("user not found: {0}")]
  UserNotFound(String),

  /// The referral code is already held by a different user.
  #[error("referral code {0} is already taken")]
  CodeConflict(String),
}

impl StoreError for Error {
  fn is_code_conflict(&self) -> bool { matches!(self, Self::CodeConflict(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
