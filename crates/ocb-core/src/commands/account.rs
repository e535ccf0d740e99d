use async_trait::async_trait;
use tracing::info;

use crate::{
    domain::CurrentUser,
    formatting::escape_html,
    linking::{link, LinkResult},
};

use super::{CommandContext, CommandError, CommandHandler, Reply};

/// `/link_account <token>`
pub struct LinkAccount;

#[async_trait]
impl CommandHandler for LinkAccount {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        _user: Option<CurrentUser>,
    ) -> Result<Reply, CommandError> {
        let [token] = ctx.args else {
            return Err(CommandError::InvalidArguments(
                "You need to provide your activation token after the command".to_string(),
            ));
        };

        let session = ctx.session().await?;
        let outcome = link(
            session.as_ref(),
            ctx.services.tokens.as_ref(),
            &ctx.services.link_token_subject,
            ctx.user_id,
            token,
        )
        .await?;

        match outcome {
            LinkResult::Linked(user) => {
                ctx.services.users.invalidate(ctx.user_id).await;
                Ok(Reply::Html(format!(
                    "Hi {}. You are now allowed to fully use the chatbot. \
                     To see the commands available, type /help",
                    escape_html(&user.username)
                )))
            }
            LinkResult::TokenExpired => Err(CommandError::TokenExpired),
            LinkResult::TokenInvalid => Err(CommandError::TokenInvalid),
            LinkResult::UserNotFound => {
                info!(
                    user_id = ctx.user_id.0,
                    "Activation token names an account that does not exist"
                );
                Err(CommandError::TokenInvalid)
            }
        }
    }
}
