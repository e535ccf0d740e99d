use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::debug;

use crate::{errors::Error, Result};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_LINK_TOKEN_SUBJECT: &str = "link_telegram";

/// Typed configuration for the chatbot.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    /// Missing token is only fatal when the bot is constructed.
    pub telegram_bot_token: Option<String>,
    pub telegram_safe_limit: usize,

    // Ouranos service API
    pub api_url: String,
    pub api_key: Option<String>,
    pub http_timeout: Duration,

    // Account linking
    pub secret_key: String,
    pub link_token_subject: String,

    // User cache
    pub user_cache_capacity: usize,
    pub user_cache_ttl: Duration,

    // Rendering
    pub templates_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// `env_file` (or `.env` in the working directory) is read first; it never
    /// overrides variables that are already set.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        load_dotenv(env_file)?;

        let secret_key = env_str("OURANOS_SECRET_KEY")
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("OURANOS_SECRET_KEY environment variable is required".to_string())
            })?;

        Ok(Self {
            telegram_bot_token: env_str("TELEGRAM_BOT_TOKEN").and_then(non_empty),
            telegram_safe_limit: env_usize("TELEGRAM_SAFE_LIMIT").unwrap_or(4000),
            api_url: env_str("OURANOS_API_URL")
                .and_then(non_empty)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: env_str("OURANOS_API_KEY").and_then(non_empty),
            http_timeout: Duration::from_secs(env_u64("HTTP_TIMEOUT_SECS").unwrap_or(10)),
            secret_key,
            link_token_subject: env_str("LINK_TOKEN_SUBJECT")
                .and_then(non_empty)
                .unwrap_or_else(|| DEFAULT_LINK_TOKEN_SUBJECT.to_string()),
            user_cache_capacity: env_usize("USER_CACHE_CAPACITY").unwrap_or(32),
            user_cache_ttl: Duration::from_secs(env_u64("USER_CACHE_TTL_SECS").unwrap_or(60)),
            templates_dir: env::var_os("TEMPLATES_DIR").map(PathBuf::from),
        })
    }
}

fn load_dotenv(env_file: Option<&Path>) -> Result<()> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
            debug!(path = %path.display(), "Loaded env file");
        }
        None => {
            // Optional: a missing `.env` is the common case.
            if let Ok(path) = dotenvy::dotenv() {
                debug!(path = %path.display(), "Loaded env file");
            }
        }
    }
    Ok(())
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
