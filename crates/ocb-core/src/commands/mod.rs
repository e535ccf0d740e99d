//! Chat commands.
//!
//! Every command is a [`CommandHandler`]. The [`CommandRegistry`] maps command
//! names to handlers (already wrapped in their guards) and is the single place
//! where failures turn into replies: nothing a handler does escapes to the
//! transport.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{
    auth::UserCache,
    domain::{ChatId, CurrentUser, Permission, UserId},
    errors::Error,
    formatting::split_message,
    guards::{RequireLinked, RequirePermission},
    ports::{ControlDispatcher, MessagingPort, Platform, PlatformSession, TokenVerifier},
    templates::Templates,
    Result,
};

mod account;
mod control;
mod ecosystems;
mod general;

pub use account::LinkAccount;
pub use control::SwitchActuator;
pub use ecosystems::{ActuatorsState, CurrentSensors, EcosystemsStatus, ListEcosystems};
pub use general::{Help, Start, UnknownCommand};

/// Name and one-line help of a command, as shown by `/help` and the bot menu.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: &'static str,
    pub help: &'static str,
}

pub const START: CommandInfo = CommandInfo {
    name: "start",
    help: "Start the conversation with the bot.",
};
pub const LINK_ACCOUNT: CommandInfo = CommandInfo {
    name: "link_account",
    help: "Link your account using the token received on the website or by email. \
           Once linked, you will have access to more commands.",
};
pub const ECOSYSTEMS: CommandInfo = CommandInfo {
    name: "ecosystems",
    help: "Get the name of the ecosystems available.",
};
pub const ECOSYSTEMS_STATUS: CommandInfo = CommandInfo {
    name: "ecosystems_status",
    help: "Get the status of the ecosystem(s) specified or all if not specified.",
};
pub const SENSORS: CommandInfo = CommandInfo {
    name: "sensors",
    help: "Get the sensors measures from the ecosystem(s) specified or all if not specified.",
};
pub const ACTUATORS_STATE: CommandInfo = CommandInfo {
    name: "actuators_state",
    help: "Get the actuators state from the ecosystem(s) specified or all if not specified.",
};
pub const SWITCH_ACTUATOR: CommandInfo = CommandInfo {
    name: "switch_actuator",
    help: "Switch an actuator on or off. Require to be an operator.",
};
pub const HELP: CommandInfo = CommandInfo {
    name: "help",
    help: "List the commands available to you.",
};

// ============== Context ==============

/// Collaborators shared by every command invocation.
pub struct Services {
    pub platform: Arc<dyn Platform>,
    pub dispatcher: Arc<dyn ControlDispatcher>,
    pub tokens: Arc<dyn TokenVerifier>,
    pub templates: Arc<Templates>,
    pub users: UserCache,
    /// Expected `sub` claim of account activation tokens.
    pub link_token_subject: String,
}

/// A parsed incoming command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    /// Lowercased command name, without `/` or `@botname`.
    pub command: String,
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub args: Vec<String>,
}

impl Invocation {
    /// `None` when `text` is not a command, or is a command addressed to
    /// another bot (`/cmd@other_bot`) while `bot_username` is known.
    pub fn parse(
        text: &str,
        chat_id: ChatId,
        user_id: UserId,
        bot_username: Option<&str>,
    ) -> Option<Self> {
        let text = text.trim();
        if !text.starts_with('/') {
            return None;
        }
        let (command, addressee, args) = parse_command(text);
        if let (Some(addressee), Some(me)) = (addressee, bot_username) {
            if !addressee.eq_ignore_ascii_case(me) {
                return None;
            }
        }
        Some(Self {
            command,
            chat_id,
            user_id,
            args,
        })
    }
}

// Telegram may send `/cmd@botname arg1 ...`
fn parse_command(text: &str) -> (String, Option<&str>, Vec<String>) {
    let mut parts = text.split_whitespace();
    let first = parts.next().unwrap_or("").trim_start_matches('/');
    let (command, addressee) = match first.split_once('@') {
        Some((command, bot)) => (command, Some(bot)),
        None => (first, None),
    };
    (
        command.to_lowercase(),
        addressee,
        parts.map(str::to_string).collect(),
    )
}

/// What a handler sees of an invocation.
pub struct CommandContext<'a> {
    pub services: &'a Services,
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub args: &'a [String],
}

impl CommandContext<'_> {
    /// Open a data-access session scoped to the caller.
    pub async fn session(&self) -> Result<Box<dyn PlatformSession>> {
        self.services.platform.session().await
    }

    /// Resolve the caller through the user cache, in a session of its own.
    pub async fn resolve_user(&self) -> Result<CurrentUser> {
        let session = self.session().await?;
        self.services
            .users
            .resolve(session.as_ref(), self.user_id)
            .await
    }

    /// `user` when a guard already resolved it, a fresh resolution otherwise.
    pub async fn user_or_resolve(&self, user: Option<CurrentUser>) -> Result<CurrentUser> {
        match user {
            Some(user) => Ok(user),
            None => self.resolve_user().await,
        }
    }
}

// ============== Handlers ==============

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Html(String),
    Text(String),
}

impl Reply {
    pub fn body(&self) -> &str {
        match self {
            Reply::Html(s) | Reply::Text(s) => s,
        }
    }
}

/// Failures a handler reports to the user.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Carries the usage or validation message shown to the user.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid token")]
    TokenInvalid,
    #[error("expired token")]
    TokenExpired,
    #[error("permission denied")]
    PermissionDenied,
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("external call failed: {0}")]
    ExternalCallFailure(String),
}

impl CommandError {
    pub fn user_message(&self) -> String {
        match self {
            CommandError::InvalidArguments(msg) | CommandError::NotFound(msg) => msg.clone(),
            CommandError::TokenInvalid => "This token is invalid".to_string(),
            CommandError::TokenExpired => {
                "This token has expired, ask for a new one and repeat the activation process"
                    .to_string()
            }
            CommandError::PermissionDenied => {
                "You do not have the permission to use this command".to_string()
            }
            CommandError::Unauthenticated => {
                "You need to be registered to use this command".to_string()
            }
            CommandError::ExternalCallFailure(_) => {
                "Something went wrong while reaching the server, please try again later"
                    .to_string()
            }
        }
    }
}

impl From<Error> for CommandError {
    fn from(err: Error) -> Self {
        CommandError::ExternalCallFailure(err.to_string())
    }
}

/// A chat command.
///
/// `user` is the caller when a guard already resolved it; handlers that need
/// the caller and get `None` resolve it themselves.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: &CommandContext<'_>,
        user: Option<CurrentUser>,
    ) -> std::result::Result<Reply, CommandError>;
}

// ============== Registry ==============

struct Registered {
    info: CommandInfo,
    handler: Box<dyn CommandHandler>,
}

pub struct CommandRegistry {
    commands: Vec<Registered>,
    fallback: Box<dyn CommandHandler>,
}

impl CommandRegistry {
    /// Every command the bot serves, with its guards.
    pub fn standard() -> Self {
        let commands = vec![
            Registered {
                info: START,
                handler: Box::new(Start),
            },
            Registered {
                info: LINK_ACCOUNT,
                handler: Box::new(LinkAccount),
            },
            Registered {
                info: ECOSYSTEMS,
                handler: Box::new(RequireLinked(ListEcosystems)),
            },
            Registered {
                info: ECOSYSTEMS_STATUS,
                handler: Box::new(RequireLinked(EcosystemsStatus)),
            },
            Registered {
                info: SENSORS,
                handler: Box::new(RequireLinked(CurrentSensors)),
            },
            Registered {
                info: ACTUATORS_STATE,
                handler: Box::new(RequireLinked(ActuatorsState)),
            },
            Registered {
                info: SWITCH_ACTUATOR,
                handler: Box::new(RequireLinked(RequirePermission::new(
                    Permission::Operate,
                    SwitchActuator,
                ))),
            },
            Registered {
                info: HELP,
                handler: Box::new(Help),
            },
        ];
        Self {
            commands,
            fallback: Box::new(UnknownCommand),
        }
    }

    /// Registered commands in menu order.
    pub fn commands(&self) -> impl Iterator<Item = CommandInfo> + '_ {
        self.commands.iter().map(|c| c.info)
    }

    fn handler(&self, name: &str) -> &dyn CommandHandler {
        self.commands
            .iter()
            .find(|c| c.info.name == name)
            .map(|c| c.handler.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }

    /// Run one invocation to a reply. Never fails.
    pub async fn execute(&self, services: &Services, invocation: &Invocation) -> Reply {
        let ctx = CommandContext {
            services,
            chat_id: invocation.chat_id,
            user_id: invocation.user_id,
            args: &invocation.args,
        };
        debug!(
            command = %invocation.command,
            user_id = invocation.user_id.0,
            args = invocation.args.len(),
            "Handling command"
        );

        match self.handler(&invocation.command).handle(&ctx, None).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(
                    command = %invocation.command,
                    user_id = invocation.user_id.0,
                    error = %err,
                    "Command failed"
                );
                Reply::Text(err.user_message())
            }
        }
    }
}

/// Send `reply`, split into as many messages as the messenger requires.
pub async fn deliver(messenger: &dyn MessagingPort, chat_id: ChatId, reply: &Reply) -> Result<()> {
    let caps = messenger.capabilities();
    for chunk in split_message(reply.body(), caps.max_message_len) {
        match reply {
            Reply::Html(_) if caps.supports_html => messenger.send_html(chat_id, &chunk).await?,
            _ => messenger.send_text(chat_id, &chunk).await?,
        };
    }
    Ok(())
}
