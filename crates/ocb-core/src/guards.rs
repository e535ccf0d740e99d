//! Authorization wrappers around command handlers.
//!
//! Guards compose: `RequireLinked(RequirePermission::new(Operate, h))` resolves
//! the user once and hands it down, so the inner check does not look it up
//! again.

use async_trait::async_trait;
use tracing::debug;

use crate::{
    commands::{CommandContext, CommandError, CommandHandler, Reply},
    domain::{CurrentUser, Permission},
};

/// Runs the wrapped handler only for users linked to an account.
pub struct RequireLinked<H>(pub H);

#[async_trait]
impl<H: CommandHandler> CommandHandler for RequireLinked<H> {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        _user: Option<CurrentUser>,
    ) -> Result<Reply, CommandError> {
        let user = ctx.resolve_user().await?;
        if user.is_anonymous() {
            debug!(user_id = ctx.user_id.0, "Rejected command from unlinked user");
            return Err(CommandError::Unauthenticated);
        }
        self.0.handle(ctx, Some(user)).await
    }
}

/// Runs the wrapped handler only when the user holds `permission`.
pub struct RequirePermission<H> {
    permission: Permission,
    inner: H,
}

impl<H> RequirePermission<H> {
    pub fn new(permission: Permission, inner: H) -> Self {
        Self { permission, inner }
    }
}

#[async_trait]
impl<H: CommandHandler> CommandHandler for RequirePermission<H> {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        user: Option<CurrentUser>,
    ) -> Result<Reply, CommandError> {
        let user = match user {
            Some(user) => user,
            None => ctx.resolve_user().await?,
        };
        if !user.can(self.permission) {
            debug!(
                user_id = ctx.user_id.0,
                permission = ?self.permission,
                "Rejected command for missing permission"
            );
            return Err(CommandError::PermissionDenied);
        }
        self.inner.handle(ctx, Some(user)).await
    }
}
