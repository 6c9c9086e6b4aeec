//! Typed RPC layer for Nocage Hub.
//!
//! Exposes an axum [`Router`] speaking the tRPC HTTP wire format, backed by
//! any [`UserStore`]. Identity is resolved from a header set by the upstream
//! auth gateway; TLS and credential checks are the gateway's responsibility.

pub mod auth;
pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod procedures;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ConfigError, RawConfig, ServerConfig};
pub use error::RpcError;

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::{Path, State},
  http::Method,
  response::Response,
  routing::{any, get},
};
use bytes::Bytes;
use nocage_core::{
  analytics::AnalyticsSink,
  referral::{Clock, SystemClock},
  store::UserStore,
};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use context::RpcContext;
use envelope::{parse_input, respond};
use procedures::{analytics, referral, user};

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: UserStore> {
  pub store:     Arc<S>,
  pub config:    Arc<ServerConfig>,
  pub clock:     Arc<dyn Clock>,
  pub analytics: Arc<dyn AnalyticsSink>,
}

impl<S: UserStore> AppState<S> {
  /// State with the system clock and the logging analytics sink.
  pub fn new(store: S, config: ServerConfig) -> Self {
    Self {
      store:     Arc::new(store),
      config:    Arc::new(config),
      clock:     Arc::new(SystemClock::new()),
      analytics: Arc::new(analytics::TracingSink),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the RPC surface.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: UserStore + Clone + 'static,
{
  Router::new()
    .route("/healthz",           get(health))
    .route("/trpc/{procedure}",  any(trpc_handler::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

// ─── Dispatch ────────────────────────────────────────────────────────────────

async fn trpc_handler<S>(
  State(state): State<AppState<S>>,
  Path(procedure): Path<String>,
  method: Method,
  ctx: RpcContext<S>,
  body: Bytes,
) -> Response
where
  S: UserStore + Clone + 'static,
{
  let path = procedure.as_str();

  let Some(kind) = procedures::lookup(path) else {
    return RpcError::NotFound(procedure.clone()).into_response_for(Some(path));
  };
  if method != kind.method() {
    return RpcError::MethodNotSupported { procedure: procedure.clone(), method }
      .into_response_for(Some(path));
  }

  match path {
    user::GET_CURRENT_USER => respond(path, user::get_current_user(&ctx)),
    referral::GENERATE => respond(path, referral::generate(&state, &ctx).await),
    analytics::TRACK_EVENT => respond(
      path,
      parse_input(&body).and_then(|input| analytics::track_event(&state, &ctx, input)),
    ),
    _ => RpcError::NotFound(procedure.clone()).into_response_for(Some(path)),
  }
}

// ─── Integration tests ────────────────────────────────────────────────────────
