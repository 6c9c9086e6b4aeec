//! Identity resolution from gateway-populated request headers.
//!
//! Credentials are verified upstream; this layer only decodes what the
//! gateway forwards. A missing or unreadable header resolves to an anonymous
//! caller rather than an error. Procedures that need a user enforce that
//! themselves via [`crate::context::RpcContext::require_user`].

use axum::http::{HeaderMap, HeaderName};
use nocage_core::user::UserIdentity;

/// Resolve the caller's identity from `headers`, if the gateway supplied one.
pub fn resolve_identity(headers: &HeaderMap, header: &HeaderName) -> Option<UserIdentity> {
  let value = headers.get(header)?;

  let Ok(raw) = value.to_str() else {
    tracing::debug!(header = %header, "identity header is not visible ASCII; treating caller as anonymous");
    return None;
  };

  match UserIdentity::from_header_value(raw) {
    Ok(identity) => Some(identity),
    Err(e) => {
      tracing::debug!(header = %header, error = %e, "ignoring identity header");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::HeaderValue;
  use nocage_core::user::IDENTITY_HEADER;

  fn header() -> HeaderName { HeaderName::from_static(IDENTITY_HEADER) }

  fn headers_with(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header(), HeaderValue::from_str(value).unwrap());
    headers
  }

  #[test]
  fn missing_header_is_anonymous() {
    assert_eq!(resolve_identity(&HeaderMap::new(), &header()), None);
  }

  #[test]
  fn well_formed_header_resolves() {
    let alice = UserIdentity {
      id:    "user_2abcXYZ9".into(),
      email: Some("alice@example.com".into()),
      name:  None,
      image: None,
    };
    let headers = headers_with(&alice.to_header_value().unwrap());
    assert_eq!(resolve_identity(&headers, &header()), Some(alice));
  }

  #[test]
  fn malformed_header_is_anonymous() {
    assert_eq!(resolve_identity(&headers_with("not-an-identity"), &header()), None);
    assert_eq!(resolve_identity(&headers_with(r#"{"id":""}"#), &header()), None);
  }

  #[test]
  fn custom_header_name_is_honoured() {
    let custom = HeaderName::from_static("x-forwarded-user");
    let mut headers = HeaderMap::new();
    headers.insert(custom.clone(), HeaderValue::from_static(r#"{"id":"u9"}"#));

    assert_eq!(resolve_identity(&headers, &header()), None);
    assert_eq!(resolve_identity(&headers, &custom).map(|u| u.id), Some("u9".into()));
  }
}
