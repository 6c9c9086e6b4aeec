//! Error types for `nocage-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("user id must not be empty")]
  EmptyUserId,

  #[error("event name must not be empty")]
  EmptyEventName,

  #[error("could not generate a unique referral code after {attempts} attempts")]
  GenerationExhausted { attempts: u32 },

  #[error("malformed identity header: {0}")]
  MalformedIdentity(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  /// Whether the caller may reasonably retry the same operation.
  pub fn is_retriable(&self) -> bool {
    matches!(self, Self::GenerationExhausted { .. })
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
