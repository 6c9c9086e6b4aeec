//! `referral.*` procedures.

use nocage_core::{
  referral::{ReferralCode, issue_referral_code},
  store::UserStore,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, context::RpcContext, error::RpcError};

pub const GENERATE: &str = "referral.generate";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOutput {
  pub referral_code: ReferralCode,
}

/// Issue (or return the existing) referral code for the signed-in caller.
///
/// Bounded both by the configured attempt count and by a wall-clock timeout.
pub async fn generate<S: UserStore>(
  state: &AppState<S>,
  ctx:   &RpcContext<S>,
) -> Result<GenerateOutput, RpcError> {
  let user = ctx.require_user()?;

  let issued = tokio::time::timeout(
    state.config.referral_timeout,
    issue_referral_code(
      ctx.store.as_ref(),
      state.clock.as_ref(),
      user,
      state.config.referral_max_attempts,
    ),
  )
  .await;

  let code = match issued {
    Ok(Ok(code)) => code,
    Ok(Err(e)) => {
      if e.is_retriable() {
        tracing::warn!(request_id = %ctx.request_id, user_id = %user.id, error = %e, "referral generation exhausted");
      }
      return Err(e.into());
    }
    Err(_) => {
      tracing::warn!(
        request_id = %ctx.request_id,
        user_id = %user.id,
        timeout_ms = state.config.referral_timeout.as_millis() as u64,
        "referral generation timed out"
      );
      return Err(RpcError::Timeout);
    }
  };

  tracing::info!(request_id = %ctx.request_id, user_id = %user.id, code = %code, "referral code issued");
  Ok(GenerateOutput { referral_code: code })
}
