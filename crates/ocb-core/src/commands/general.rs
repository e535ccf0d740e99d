use async_trait::async_trait;
use serde_json::json;

use crate::{
    domain::{CurrentUser, Permission},
    formatting::escape_html,
};

use super::{
    CommandContext, CommandError, CommandHandler, CommandInfo, Reply, ACTUATORS_STATE,
    ECOSYSTEMS, ECOSYSTEMS_STATUS, LINK_ACCOUNT, SENSORS, SWITCH_ACTUATOR,
};

/// `/start`
pub struct Start;

#[async_trait]
impl CommandHandler for Start {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        user: Option<CurrentUser>,
    ) -> Result<Reply, CommandError> {
        let user = ctx.user_or_resolve(user).await?;
        let greetings = match user.display_name() {
            Some(name) => format!("Hi {}", escape_html(name)),
            None => "Hello".to_string(),
        };
        Ok(Reply::Html(format!(
            "{greetings}, welcome to GAIA! To see the commands available, type /help."
        )))
    }
}

/// Commands `user` may run, in the order `/help` lists them.
pub(super) fn available_commands(user: &CurrentUser) -> Vec<CommandInfo> {
    if user.is_anonymous() {
        return vec![LINK_ACCOUNT];
    }
    let mut commands = vec![ECOSYSTEMS, ECOSYSTEMS_STATUS, SENSORS, ACTUATORS_STATE];
    if user.can(Permission::Operate) {
        commands.push(SWITCH_ACTUATOR);
    }
    commands
}

/// `/help`
pub struct Help;

#[async_trait]
impl CommandHandler for Help {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        user: Option<CurrentUser>,
    ) -> Result<Reply, CommandError> {
        let user = ctx.user_or_resolve(user).await?;
        let commands: Vec<_> = available_commands(&user)
            .into_iter()
            .map(|c| json!({ "name": c.name, "help": c.help }))
            .collect();
        let html = ctx
            .services
            .templates
            .render("help", &json!({ "commands": commands }))?;
        Ok(Reply::Html(html))
    }
}

/// Fallback for any `/command` nobody registered.
pub struct UnknownCommand;

#[async_trait]
impl CommandHandler for UnknownCommand {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        user: Option<CurrentUser>,
    ) -> Result<Reply, CommandError> {
        let user = ctx.user_or_resolve(user).await?;
        let sorry = match user.username() {
            Some(name) => format!("Sorry {name},"),
            None => "Sorry,".to_string(),
        };
        Ok(Reply::Text(format!(
            "{sorry} I did not understand that command. Use /help to see the commands available"
        )))
    }
}
