//! RPC procedures and their HTTP binding.
//!
//! | Procedure              | Kind     | Auth      |
//! |------------------------|----------|-----------|
//! | `user.getCurrentUser`  | query    | public    |
//! | `referral.generate`    | mutation | protected |
//! | `analytics.trackEvent` | mutation | public    |

use axum::http::Method;

pub mod analytics;
pub mod referral;
pub mod user;

/// How a procedure is invoked over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
  /// `GET /trpc/{procedure}`
  Query,
  /// `POST /trpc/{procedure}` with a JSON body.
  Mutation,
}

impl Kind {
  pub fn method(self) -> Method {
    match self {
      Self::Query => Method::GET,
      Self::Mutation => Method::POST,
    }
  }
}

const PROCEDURES: &[(&str, Kind)] = &[
  (user::GET_CURRENT_USER, Kind::Query),
  (referral::GENERATE, Kind::Mutation),
  (analytics::TRACK_EVENT, Kind::Mutation),
];

pub fn lookup(name: &str) -> Option<Kind> {
  PROCEDURES
    .iter()
    .find(|(known, _)| *known == name)
    .map(|(_, kind)| *kind)
}
