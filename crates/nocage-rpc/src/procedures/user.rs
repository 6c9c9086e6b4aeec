//! `user.*` procedures.

use nocage_core::{store::UserStore, user::UserIdentity};

use crate::{context::RpcContext, error::RpcError};

pub const GET_CURRENT_USER: &str = "user.getCurrentUser";

/// The caller's resolved identity, or `null` for anonymous callers.
pub fn get_current_user<S: UserStore>(
  ctx: &RpcContext<S>,
) -> Result<Option<UserIdentity>, RpcError> {
  Ok(ctx.user.clone())
}
