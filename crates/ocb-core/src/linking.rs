//! Linking a Telegram identity to an Ouranos account with an activation token.

use tracing::{debug, info};

use crate::{
    domain::{AppUser, UserId, UserUpdate},
    ports::{PlatformSession, TokenError, TokenVerifier},
    Result,
};

#[derive(Clone, Debug, PartialEq)]
pub enum LinkResult {
    Linked(AppUser),
    TokenExpired,
    TokenInvalid,
    UserNotFound,
}

/// Verify `token` and, when it names an existing account, store `telegram_id`
/// on that account.
///
/// Re-linking overwrites the previous mapping. Single use of the token is the
/// token service's business.
pub async fn link(
    session: &dyn PlatformSession,
    verifier: &dyn TokenVerifier,
    expected_subject: &str,
    telegram_id: UserId,
    token: &str,
) -> Result<LinkResult> {
    let claims = match verifier.verify(token) {
        Ok(claims) => claims,
        Err(TokenError::Expired) => return Ok(LinkResult::TokenExpired),
        Err(TokenError::Invalid(reason)) => {
            debug!(telegram_id = telegram_id.0, %reason, "Rejected activation token");
            return Ok(LinkResult::TokenInvalid);
        }
    };

    let subject = claims.get("sub").and_then(|v| v.as_str());
    if subject != Some(expected_subject) {
        debug!(telegram_id = telegram_id.0, ?subject, "Activation token has the wrong subject");
        return Ok(LinkResult::TokenInvalid);
    }
    let Some(user_id) = claims.get("user_id").and_then(|v| v.as_i64()) else {
        debug!(telegram_id = telegram_id.0, "Activation token has no user_id");
        return Ok(LinkResult::TokenInvalid);
    };

    let Some(user) = session.get_user(user_id).await? else {
        return Ok(LinkResult::UserNotFound);
    };

    session
        .update_user(
            user.id,
            UserUpdate {
                telegram_id: Some(telegram_id.0),
            },
        )
        .await?;
    info!(telegram_id = telegram_id.0, user_id = user.id, "Linked Telegram account");
    Ok(LinkResult::Linked(user))
}
