use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use ocb_core::{auth::UserCache, commands::Services, config::Config, templates::Templates};
use ocb_ouranos::{HttpPlatform, JwtTokenVerifier};
use ocb_telegram::Chatbot;

/// Telegram chatbot for the Ouranos greenhouse platform
#[derive(Parser, Debug)]
#[command(name = "ocb", version)]
struct Args {
    /// Env file to load before reading the environment (default: ./.env if present)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Directory of `<name>.html` templates overriding the built-in ones
    #[arg(long)]
    templates_dir: Option<PathBuf>,

    /// Verbose logging (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    ocb_core::logging::init("ocb", args.verbose)?;

    if let Err(e) = run(args).await {
        error!(error = %format!("{e:#}"), "ocb stopped on error");
        return Err(e);
    }
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut cfg = Config::load(args.env_file.as_deref())?;
    if args.templates_dir.is_some() {
        cfg.templates_dir = args.templates_dir;
    }

    let templates = Templates::load(cfg.templates_dir.as_deref())
        .context("failed to load templates")?;
    let platform = HttpPlatform::new(&cfg)?;
    let services = Services {
        platform: Arc::new(platform.clone()),
        dispatcher: Arc::new(platform.dispatcher()),
        tokens: Arc::new(JwtTokenVerifier::new(&cfg.secret_key)),
        templates: Arc::new(templates),
        users: UserCache::new(cfg.user_cache_capacity, cfg.user_cache_ttl),
        link_token_subject: cfg.link_token_subject.clone(),
    };
    info!(api_url = %cfg.api_url, "Using Ouranos API");

    let bot = Chatbot::new(&cfg, services)?;
    bot.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown requested");
    bot.stop().await?;

    Ok(())
}
