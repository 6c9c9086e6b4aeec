//! The `UserStore` trait: the persistence collaborator behind referral
//! issuance.
//!
//! Implemented by storage backends (e.g. `nocage-store-sqlite`). The RPC layer
//! depends on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  referral::ReferralCode,
  user::{UserIdentity, UserRecord},
};

/// Error classification the core needs from any backend.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// True when a write was refused because another user already holds the
  /// referral code (a uniqueness-constraint violation).
  fn is_code_conflict(&self) -> bool { false }
}

impl StoreError for std::convert::Infallible {}

/// Result of [`UserStore::assign_referral_code`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
  /// The code was written to the user's record.
  Assigned(ReferralCode),
  /// The user already held a code; it is returned unchanged.
  AlreadyAssigned(ReferralCode),
}

impl AssignOutcome {
  pub fn into_code(self) -> ReferralCode {
    match self {
      Self::Assigned(code) | Self::AlreadyAssigned(code) => code,
    }
  }
}

/// Abstraction over the user persistence backend.
///
/// All methods return `Send` futures so the trait can be used behind `axum`
/// handlers on a multi-threaded runtime.
pub trait UserStore: Send + Sync {
  type Error: StoreError;

  /// Create the record for `identity`, or refresh its profile fields if it
  /// already exists. Never touches the referral code.
  fn upsert_user(
    &self,
    identity: UserIdentity,
  ) -> impl Future<Output = Result<UserRecord, Self::Error>> + Send + '_;

  /// Retrieve a user by id. Returns `None` if not found.
  fn get_user<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<UserRecord>, Self::Error>> + Send + 'a;

  /// Find the user holding `code`, if any.
  fn find_user_by_referral_code<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<Option<UserRecord>, Self::Error>> + Send + 'a;

  /// Whether any user holds `code`.
  fn referral_code_exists<'a>(
    &'a self,
    code: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a {
    async move { Ok(self.find_user_by_referral_code(code).await?.is_some()) }
  }

  /// Attach `code` to the user, atomically with the storage-level uniqueness
  /// constraint.
  ///
  /// A user's code is written at most once. If the user already has one it
  /// is returned as [`AssignOutcome::AlreadyAssigned`]. If another user holds
  /// `code`, the returned error reports [`StoreError::is_code_conflict`].
  fn assign_referral_code<'a>(
    &'a self,
    user_id: &'a str,
    code: &'a ReferralCode,
  ) -> impl Future<Output = Result<AssignOutcome, Self::Error>> + Send + 'a;
}
