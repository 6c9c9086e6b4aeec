//! tRPC-compatible request input and response envelopes.

use axum::{
  Json,
  response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::RpcError;

/// `{"result":{"data": ...}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct Success<T> {
  pub result: Data<T>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Data<T> {
  pub data: T,
}

/// Render a procedure's outcome for the procedure at `path`.
pub fn respond<T: Serialize>(path: &str, result: Result<T, RpcError>) -> Response {
  match result {
    Ok(data) => Json(Success { result: Data { data } }).into_response(),
    Err(e) => e.into_response_for(Some(path)),
  }
}

/// Decode a mutation body.
///
/// An empty body is treated as `null`. A `{"json": ...}` wrapper, as sent by
/// clients using a superjson transformer, is unwrapped.
pub fn parse_input<T: DeserializeOwned>(body: &[u8]) -> Result<T, RpcError> {
  let value: Value = if body.iter().all(u8::is_ascii_whitespace) {
    Value::Null
  } else {
    serde_json::from_slice(body)
      .map_err(|e| RpcError::BadRequest(format!("input is not valid JSON: {e}")))?
  };

  let value = match value {
    Value::Object(mut map) if map.len() == 1 && map.contains_key("json") => {
      map.remove("json").unwrap_or(Value::Null)
    }
    other => other,
  };

  serde_json::from_value(value).map_err(|e| RpcError::BadRequest(format!("invalid input: {e}")))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Deserialize, PartialEq)]
  struct Input {
    event: String,
  }

  #[test]
  fn plain_and_wrapped_inputs_decode_alike() {
    let plain: Input = parse_input(br#"{"event":"page_view"}"#).unwrap();
    let wrapped: Input = parse_input(br#"{"json":{"event":"page_view"}}"#).unwrap();
    assert_eq!(plain, wrapped);
  }

  #[test]
  fn empty_body_is_null() {
    let none: Option<Input> = parse_input(b"  ").unwrap();
    assert_eq!(none, None);
    assert!(matches!(parse_input::<Input>(b""), Err(RpcError::BadRequest(_))));
  }

  #[test]
  fn invalid_json_is_bad_request() {
    assert!(matches!(parse_input::<Input>(b"{oops"), Err(RpcError::BadRequest(_))));
  }
}
