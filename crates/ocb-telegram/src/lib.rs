//! Telegram adapter (teloxide).
//!
//! Implements the `ocb-core` MessagingPort over the Telegram Bot API and hosts
//! the chatbot lifecycle.

use async_trait::async_trait;

use teloxide::{prelude::*, types::ParseMode};

pub mod bot;
pub mod router;

pub use bot::Chatbot;

#[cfg(test)]
mod fake_api;

use ocb_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    ports::{MessagingCapabilities, MessagingPort},
    Result,
};

/// Hard limit of the Bot API for one text message.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    safe_limit: usize,
}

impl TelegramMessenger {
    /// `safe_limit` caps message length below the API limit, leaving room for
    /// entities Telegram counts differently.
    pub fn new(bot: Bot, safe_limit: usize) -> Self {
        Self {
            bot,
            safe_limit: safe_limit.clamp(200, TELEGRAM_MAX_MESSAGE_LEN),
        }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    /// Every failure, rate limiting included, is reported once and never re-sent.
    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_html: true,
            max_message_len: self.safe_limit,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = self
            .bot
            .send_message(Self::tg_chat(chat_id), html)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(Self::map_err)?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
        let msg = self
            .bot
            .send_message(Self::tg_chat(chat_id), text)
            .await
            .map_err(Self::map_err)?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }
}
