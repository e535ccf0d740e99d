use std::sync::Arc;

use teloxide::{
    dispatching::UpdateHandler,
    dptree,
    prelude::*,
    types::{BotCommand, Me},
};
use tracing::{debug, warn};

use ocb_core::{
    commands::{deliver, CommandInfo, CommandRegistry, Invocation, Services},
    domain::{ChatId, UserId},
    ports::MessagingPort,
};

#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub registry: Arc<CommandRegistry>,
    pub messenger: Arc<dyn MessagingPort>,
}

fn is_command(msg: &Message) -> bool {
    msg.text().is_some_and(|t| t.trim_start().starts_with('/'))
}

/// Commands only; every other update is ignored.
pub fn schema() -> UpdateHandler<anyhow::Error> {
    dptree::entry().branch(
        Update::filter_message()
            .filter(|msg: Message| is_command(&msg))
            .endpoint(handle_message),
    )
}

async fn handle_message(msg: Message, me: Me, state: Arc<AppState>) -> anyhow::Result<()> {
    let (Some(text), Some(from)) = (msg.text(), msg.from()) else {
        return Ok(());
    };
    let chat_id = ChatId(msg.chat.id.0);
    let bot_username = me.user.username.as_deref();
    let Some(invocation) = Invocation::parse(text, chat_id, UserId(from.id.0 as i64), bot_username)
    else {
        debug!(chat_id = chat_id.0, "Ignoring command addressed to another bot");
        return Ok(());
    };

    let reply = state.registry.execute(&state.services, &invocation).await;
    if let Err(e) = deliver(state.messenger.as_ref(), chat_id, &reply).await {
        warn!(chat_id = chat_id.0, command = %invocation.command, error = %e, "Failed to send reply");
    } else {
        debug!(chat_id = chat_id.0, command = %invocation.command, "Reply sent");
    }
    Ok(())
}

/// Command menu published to Telegram.
pub fn bot_commands(commands: impl IntoIterator<Item = CommandInfo>) -> Vec<BotCommand> {
    commands
        .into_iter()
        .map(|c| BotCommand::new(c.name, c.help))
        .collect()
}
