//! Chatbot lifecycle: start polling, stop gracefully.

use std::sync::Arc;

use teloxide::{
    dispatching::{Dispatcher, ShutdownToken},
    dptree,
    prelude::*,
};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

use ocb_core::{
    commands::{CommandRegistry, Services},
    config::Config,
    errors::Error,
    Result,
};

use crate::{
    router::{bot_commands, schema, AppState},
    TelegramMessenger,
};

struct Running {
    shutdown: ShutdownToken,
    task: JoinHandle<()>,
}

/// Owns the bot client and the dispatcher task.
///
/// `start` and `stop` are idempotent and may be called in any order.
pub struct Chatbot {
    bot: Bot,
    state: Arc<AppState>,
    running: Mutex<Option<Running>>,
}

impl Chatbot {
    /// Fails with [`Error::Config`] when no bot token is configured.
    pub fn new(cfg: &Config, services: Services) -> Result<Self> {
        let token = cfg.telegram_bot_token.clone().ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN is not set, the chatbot is disabled".to_string())
        })?;
        Ok(Self::from_bot(Bot::new(token), cfg.telegram_safe_limit, services))
    }

    fn from_bot(bot: Bot, safe_limit: usize, services: Services) -> Self {
        let messenger = Arc::new(TelegramMessenger::new(bot.clone(), safe_limit));
        Self {
            bot,
            state: Arc::new(AppState {
                services: Arc::new(services),
                registry: Arc::new(CommandRegistry::standard()),
                messenger,
            }),
            running: Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Start long polling in a background task.
    pub async fn start(&self) -> Result<()> {
        if self.is_running().await {
            debug!("Chatbot already running");
            return Ok(());
        }
        // Network call; `stop` must not wait behind it.
        self.publish_commands().await;

        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("Chatbot already running");
            return Ok(());
        }

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), schema())
            .dependencies(dptree::deps![Arc::clone(&self.state)])
            .default_handler(|_| async {})
            .build();
        let shutdown = dispatcher.shutdown_token();
        let task = tokio::spawn(async move {
            dispatcher.dispatch().await;
        });

        *running = Some(Running { shutdown, task });
        info!("Chatbot started");
        Ok(())
    }

    /// Stop polling, let in-flight handlers finish, then release the client.
    pub async fn stop(&self) -> Result<()> {
        let Some(Running { shutdown, task }) = self.running.lock().await.take() else {
            debug!("Chatbot not running");
            return Ok(());
        };

        match shutdown.shutdown() {
            Ok(done) => done.await,
            // Dispatch has not begun polling yet; nothing is in flight.
            Err(_) => task.abort(),
        }
        if let Err(e) = task.await {
            if !e.is_cancelled() {
                return Err(Error::External(format!("dispatcher task failed: {e}")));
            }
        }
        info!("Chatbot stopped");
        Ok(())
    }

    /// Best effort: the bot works without a published menu.
    async fn publish_commands(&self) {
        let commands = bot_commands(self.state.registry.commands());
        match self.bot.set_my_commands(commands).await {
            Ok(_) => debug!("Published command menu"),
            Err(e) => warn!(error = %e, "Could not publish command menu"),
        }
    }
}
