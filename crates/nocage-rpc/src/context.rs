//! Per-request RPC execution context.

use std::{convert::Infallible, sync::Arc};

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, HeaderName, request::Parts},
};
use nocage_core::{store::UserStore, user::UserIdentity};
use uuid::Uuid;

use crate::{AppState, auth::resolve_identity, error::RpcError};

/// Correlation header; honoured when it carries a UUID.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Built fresh for every request and dropped with it. Read-only once built.
pub struct RpcContext<S> {
  pub user:       Option<UserIdentity>,
  pub store:      Arc<S>,
  pub request_id: Uuid,
}

impl<S> RpcContext<S>
where
  S: UserStore,
{
  pub fn from_headers(headers: &HeaderMap, state: &AppState<S>) -> Self {
    let user = resolve_identity(headers, &state.config.identity_header);
    let request_id = headers
      .get(&REQUEST_ID_HEADER)
      .and_then(|v| v.to_str().ok())
      .and_then(|s| Uuid::parse_str(s).ok())
      .unwrap_or_else(Uuid::new_v4);

    match &user {
      Some(u) => tracing::info!(%request_id, user_id = %u.id, "rpc context created"),
      None => tracing::info!(%request_id, "rpc context created for anonymous caller"),
    }

    Self { user, store: state.store.clone(), request_id }
  }

  /// The resolved caller, or [`RpcError::Unauthenticated`].
  pub fn require_user(&self) -> Result<&UserIdentity, RpcError> {
    self.user.as_ref().ok_or(RpcError::Unauthenticated)
  }
}

impl<S> FromRequestParts<AppState<S>> for RpcContext<S>
where
  S: UserStore + Clone + 'static,
{
  type Rejection = Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    Ok(Self::from_headers(&parts.headers, state))
  }
}
