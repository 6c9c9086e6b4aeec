//! Client-side session state and the sign-out command.
//!
//! Shared logic never performs navigation itself. Signing out clears the
//! session and hands back a [`Navigation`] for the front end to carry out.

use nocage_core::user::{AuthState, UserIdentity};

/// A navigation the caller should perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
  Redirect(String),
}

/// Tracks the auth state for one client session.
#[derive(Debug, Clone)]
pub struct Session {
  state:        AuthState,
  sign_out_url: String,
}

impl Session {
  /// A fresh session whose identity has not been resolved yet.
  pub fn new(sign_out_url: impl Into<String>) -> Self {
    Self { state: AuthState::loading(), sign_out_url: sign_out_url.into() }
  }

  pub fn state(&self) -> &AuthState { &self.state }

  /// Settle the loading state with the resolved identity.
  pub fn resolve(&mut self, identity: Option<UserIdentity>) {
    self.state = match identity {
      Some(identity) => AuthState::signed_in(identity),
      None => AuthState::anonymous(),
    };
  }

  /// Drop the identity and return where the front end should go next.
  pub fn sign_out(&mut self) -> Navigation {
    if let Some(identity) = &self.state.identity {
      tracing::info!(user_id = %identity.id, "signing out");
    }
    self.state = AuthState::anonymous();
    Navigation::Redirect(self.sign_out_url.clone())
  }
}
