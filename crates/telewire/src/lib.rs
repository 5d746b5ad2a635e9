//! # Telewire
//!
//! A multi-account bot runtime for the Telegram Bot API.
//!
//! ## Overview
//!
//! One process can drive any number of bot credentials. Each credential gets
//! a session with its own event bus and update offset; a single poller keeps
//! every enabled session fetching, and callbacks subscribe to updates by
//! structure (`"callback_query"`), by alias (`"text"`, `"edit"`) or by
//! content (`"/start"`, a regex).
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  fetch   ┌──────────┐  updates  ┌────────────┐     ┌──────────┐
//! │ Transport │◀─────────│  Poller  │──────────▶│ BotSession │────▶│ EventBus │──▶ callbacks
//! └───────────┘          └──────────┘           └────────────┘     └──────────┘
//! ```
//!
//! - **Core**: update model, matchers, event bus and error types
//! - **Transport**: JSON and multipart request pipeline with staged uploads
//! - **Runtime**: sessions, poller, remote method wrappers, config and logging
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use telewire::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = TelewireRuntime::new()?;
//!     let bot = runtime.session("123456:ABC-DEF");
//!
//!     bot.subscribe_sync(
//!         |update| {
//!             println!("{:?}", update.text());
//!             Ok(())
//!         },
//!         ["text"],
//!     );
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: Load `telewire.toml` files (default)
//! - `yaml-config`: Load `telewire.yaml` files
//! - `json-log`: Enable the JSON log format

pub use telewire_core as core;
pub use telewire_runtime as runtime;
pub use telewire_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use telewire::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use telewire_runtime::{BotSession, RuntimeBuilder, TelewireRuntime, TickOutcome};

    // Event system - for subscribing callbacks
    pub use telewire_core::{
        Callback, EventBus, HandlerResult, Matcher, SubscriptionId, Update, UpdateKind,
    };

    // Remote calls
    pub use telewire_core::{ApiError, ApiResult};
    pub use telewire_transport::{ApiResponse, Attachment, Params};
}
