//! Echo Bot Demo
//!
//! A small demonstration of the telewire runtime: one or more bot tokens,
//! each with a handful of subscriptions.
//!
//! # Subscriptions
//!
//! - `"text"` logs every message and channel post
//! - `"/echo"` replies with the rest of the command
//! - `"/ping"` replies with Pong
//! - `"/photo"` uploads the file given with `--photo`
//! - `"callback_query"` acknowledges inline keyboard presses
//!
//! # Usage
//!
//! ```bash
//! TELEWIRE_TOKEN=123456:ABC-DEF cargo run --package echo-bot
//! cargo run --package echo-bot -- --token 123456:ABC-DEF --config telewire.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use telewire::prelude::*;
use telewire::runtime::mask_credential;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "Echo bot demo for the telewire runtime")]
struct Cli {
    /// Bot token(s); repeat the flag or separate with commas to run several bots.
    #[arg(long = "token", env = "TELEWIRE_TOKEN", value_delimiter = ',', required = true)]
    tokens: Vec<String>,

    /// Configuration file (defaults to telewire.toml in the current directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. "development" or "production".
    #[arg(long)]
    profile: Option<String>,

    /// Image sent in reply to /photo.
    #[arg(long)]
    photo: Option<PathBuf>,
}

// ============================================================================
// Helpers
// ============================================================================

/// Chat id of the message or channel post carried by `update`.
fn chat_id(update: &Update) -> Option<i64> {
    [UpdateKind::Message, UpdateKind::ChannelPost]
        .into_iter()
        .find_map(|kind| update.payload(kind))
        .and_then(|payload| payload["chat"]["id"].as_i64())
}

async fn reply(bot: &BotSession, update: &Update, text: &str) -> ApiResult<()> {
    let Some(chat_id) = chat_id(update) else {
        return Ok(());
    };
    bot.send_message(Params::new().with("chat_id", chat_id).with("text", text))
        .await?
        .into_result()?;
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

fn register(bot: &Arc<BotSession>, photo: Option<Arc<Attachment>>) {
    let name = bot.masked_credential().to_string();
    bot.subscribe_sync(
        move |update| {
            info!(bot = %name, text = ?update.text(), "Message received");
            Ok(())
        },
        ["text"],
    );

    let session = Arc::clone(bot);
    bot.subscribe(
        move |update: Arc<Update>| {
            let bot = Arc::clone(&session);
            async move {
                let content = update
                    .text()
                    .and_then(|t| t.strip_prefix("/echo"))
                    .map(str::trim)
                    .unwrap_or_default();
                if !content.is_empty() {
                    reply(&bot, &update, content).await?;
                }
                Ok(())
            }
        },
        ["/echo"],
    );

    let session = Arc::clone(bot);
    bot.subscribe(
        move |update: Arc<Update>| {
            let bot = Arc::clone(&session);
            async move {
                reply(&bot, &update, "Pong!").await?;
                Ok(())
            }
        },
        ["/ping"],
    );

    let session = Arc::clone(bot);
    bot.subscribe(
        move |update: Arc<Update>| {
            let bot = Arc::clone(&session);
            let photo = photo.clone();
            async move {
                let (Some(photo), Some(chat_id)) = (photo, chat_id(&update)) else {
                    return Ok(());
                };
                bot.send_photo(
                    Params::new()
                        .with("chat_id", chat_id)
                        .with("photo", Attachment::clone(&photo))
                        .with("caption", "Here you go"),
                )
                .await?
                .into_result()?;
                Ok(())
            }
        },
        ["/photo"],
    );

    let session = Arc::clone(bot);
    bot.subscribe(
        move |update: Arc<Update>| {
            let bot = Arc::clone(&session);
            async move {
                let query_id = update
                    .populated("callback_query")
                    .and_then(|q| q.get("id"))
                    .and_then(Value::as_str);
                if let Some(id) = query_id {
                    bot.answer_callback_query(
                        Params::new().with("callback_query_id", id).with("text", "Got it"),
                    )
                    .await?;
                }
                Ok(())
            }
        },
        ["callback_query"],
    );
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = TelewireRuntime::builder();
    if let Some(path) = &cli.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &cli.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build()?;

    let photo = match &cli.photo {
        Some(path) => {
            let data = tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "photo".to_string());
            Some(Arc::new(Attachment::new(data).with_file_name(name)))
        }
        None => None,
    };

    for token in &cli.tokens {
        let bot = runtime.session(token);
        match bot.call("getMe", Params::new()).await {
            Ok(me) => info!(bot = %mask_credential(token), username = ?me["username"], "Bot online"),
            Err(e) => warn!(bot = %mask_credential(token), error = %e, "getMe failed"),
        }
        register(&bot, photo.clone());
    }

    info!("{}", runtime.stats());
    runtime.run().await?;

    Ok(())
}
