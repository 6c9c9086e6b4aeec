//! Resolved user identity and the client-facing auth state.
//!
//! Identities are produced by the external auth service and forwarded by the
//! upstream gateway in a request header. This layer never mutates them; it
//! only projects them into a [`UserRecord`] so a referral code can be
//! attached.

use base64::Engine as _;
use base64::engine::general_purpose::{
  STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, referral::ReferralCode};

/// Header the upstream gateway populates with the resolved identity.
pub const IDENTITY_HEADER: &str = "x-nocage-user";

/// The authenticated user descriptor for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
  /// Opaque identifier issued by the auth service.
  pub id:    String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:  Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
}

impl UserIdentity {
  pub fn new(id: impl Into<String>) -> Self {
    Self { id: id.into(), email: None, name: None, image: None }
  }

  /// Decode the gateway header value.
  ///
  /// Accepts either the raw JSON object or its base64 encoding (standard or
  /// URL-safe alphabet, padded or not).
  pub fn from_header_value(raw: &str) -> Result<Self> {
    let raw = raw.trim();
    if raw.is_empty() {
      return Err(Error::MalformedIdentity("empty header".into()));
    }

    let json = if raw.starts_with('{') {
      raw.as_bytes().to_vec()
    } else {
      [&URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD]
        .iter()
        .find_map(|engine| engine.decode(raw).ok())
        .ok_or_else(|| Error::MalformedIdentity("not valid base64".into()))?
    };

    let mut identity: Self = serde_json::from_slice(&json)
      .map_err(|e| Error::MalformedIdentity(e.to_string()))?;

    let id = identity.id.trim();
    if id.is_empty() {
      return Err(Error::MalformedIdentity("identity has an empty id".into()));
    }
    if id.len() != identity.id.len() {
      identity.id = id.to_owned();
    }
    Ok(identity)
  }

  /// Encode as the gateway would: URL-safe base64 of the JSON form.
  pub fn to_header_value(&self) -> Result<String> {
    let json = serde_json::to_vec(self)
      .map_err(|e| Error::MalformedIdentity(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
  }
}

/// Persisted projection of an identity, owned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
  pub identity:      UserIdentity,
  pub referral_code: Option<ReferralCode>,
  pub created_at:    DateTime<Utc>,
}

/// Auth state as seen by a client session.
///
/// `is_loading` is true while the identity has not yet been resolved; once
/// resolution finishes `identity` is either present or definitively absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
  pub identity:   Option<UserIdentity>,
  pub is_loading: bool,
}

impl AuthState {
  pub fn loading() -> Self { Self { identity: None, is_loading: true } }

  pub fn anonymous() -> Self { Self { identity: None, is_loading: false } }

  pub fn signed_in(identity: UserIdentity) -> Self {
    Self { identity: Some(identity), is_loading: false }
  }

  pub fn is_authenticated(&self) -> bool { self.identity.is_some() }
}
