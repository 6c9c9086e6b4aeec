//! RPC error type and its wire envelope.
//!
//! Every failure leaves the server in the tRPC error shape:
//!
//! ```json
//! {"error":{"message":"...","code":-32001,"data":{"code":"UNAUTHORIZED","httpStatus":401,"path":"referral.generate"}}}
//! ```

use axum::{
  Json,
  http::{Method, StatusCode},
  response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
  #[error("you must be signed in to call this procedure")]
  Unauthenticated,

  #[error("could not generate a unique referral code after {attempts} attempts, try again")]
  GenerationExhausted { attempts: u32 },

  #[error("procedure timed out")]
  Timeout,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("no procedure named {0:?}")]
  NotFound(String),

  #[error("procedure {procedure:?} does not accept {method} requests")]
  MethodNotSupported { procedure: String, method: Method },

  #[error("internal error: {0}")]
  Internal(String),
}

impl RpcError {
  /// The tRPC error code name.
  pub fn code(&self) -> &'static str {
    match self {
      Self::Unauthenticated => "UNAUTHORIZED",
      Self::GenerationExhausted { .. } => "SERVICE_UNAVAILABLE",
      Self::Timeout => "TIMEOUT",
      Self::BadRequest(_) => "BAD_REQUEST",
      Self::NotFound(_) => "NOT_FOUND",
      Self::MethodNotSupported { .. } => "METHOD_NOT_SUPPORTED",
      Self::Internal(_) => "INTERNAL_SERVER_ERROR",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::Unauthenticated => StatusCode::UNAUTHORIZED,
      Self::GenerationExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
      Self::Timeout => StatusCode::REQUEST_TIMEOUT,
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::MethodNotSupported { .. } => StatusCode::METHOD_NOT_ALLOWED,
      Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  /// JSON-RPC 2.0 numeric code, as tRPC reports it.
  fn json_rpc_code(&self) -> i32 {
    match self {
      Self::Unauthenticated => -32001,
      Self::Timeout => -32008,
      Self::BadRequest(_) => -32600,
      Self::NotFound(_) => -32004,
      Self::MethodNotSupported { .. } => -32005,
      Self::GenerationExhausted { .. } | Self::Internal(_) => -32603,
    }
  }

  /// Whether the caller may retry the same call unchanged.
  pub fn is_retriable(&self) -> bool {
    matches!(self, Self::GenerationExhausted { .. } | Self::Timeout)
  }

  pub fn to_body(&self, path: Option<&str>) -> Value {
    json!({
      "error": {
        "message": self.to_string(),
        "code":    self.json_rpc_code(),
        "data": {
          "code":       self.code(),
          "httpStatus": self.status().as_u16(),
          "path":       path,
          "retryable":  self.is_retriable(),
        },
      }
    })
  }

  /// Render for a specific procedure path.
  pub fn into_response_for(self, path: Option<&str>) -> Response {
    if let Self::Internal(msg) = &self {
      tracing::error!(path, error = %msg, "procedure failed");
    }
    (self.status(), Json(self.to_body(path))).into_response()
  }
}

impl IntoResponse for RpcError {
  fn into_response(self) -> Response { self.into_response_for(None) }
}

impl From<nocage_core::Error> for RpcError {
  fn from(e: nocage_core::Error) -> Self {
    use nocage_core::Error as Core;
    match e {
      Core::GenerationExhausted { attempts } => Self::GenerationExhausted { attempts },
      Core::EmptyUserId | Core::EmptyEventName | Core::MalformedIdentity(_) => {
        Self::BadRequest(e.to_string())
      }
      Core::Store(inner) => Self::Internal(inner.to_string()),
    }
  }
}
