//! Telewire Runtime - orchestration layer for the telewire bot runtime.
//!
//! This crate provides:
//! - Per-credential bot sessions ([`BotSession`], [`SessionRegistry`])
//! - The polling scheduler that fetches and dispatches updates ([`Poller`])
//! - Runtime orchestration ([`TelewireRuntime`])
//! - Typed wrappers for the remote API methods ([`API_METHODS`])
//! - Configuration loading and logging setup
//!
//! # Quick Start
//!
//! ```ignore
//! use telewire_runtime::TelewireRuntime;
//! use telewire_transport::Params;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = TelewireRuntime::new()?;
//!     let bot = runtime.session("123456:ABC-DEF");
//!
//!     let replier = bot.clone();
//!     bot.subscribe(
//!         move |update| {
//!             let bot = replier.clone();
//!             async move {
//!                 let chat = update.payload(telewire_core::UpdateKind::Message)
//!                     .and_then(|m| m["chat"]["id"].as_i64());
//!                 if let Some(chat_id) = chat {
//!                     bot.send_message(Params::new().with("chat_id", chat_id).with("text", "pong"))
//!                         .await?;
//!                 }
//!                 Ok(())
//!             }
//!         },
//!         ["/ping"],
//!     );
//!
//!     // Poll until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Polling
//!
//! The poller wakes on a fixed interval and starts one tick per enabled
//! session that has no tick in flight. A tick fetches updates after the
//! highest id seen so far and pushes each one through the session's event
//! bus. Transport failures are retried once after a backoff.

pub mod config;
pub mod error;
pub mod logging;
pub mod methods;
pub mod poller;
pub mod registry;
pub mod runtime;
pub mod session;

#[cfg(test)]
mod testing;

// Re-exports
pub use config::{
    ApiConfig, ConfigError, ConfigLoader, ConfigResult, LoggingConfig, PollingConfig, Profile,
    TelewireConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use methods::API_METHODS;
pub use poller::{PollSettings, Poller, TickOutcome};
pub use registry::{RegistryStats, SessionRegistry, TickGuard};
pub use runtime::{RuntimeBuilder, RuntimeStats, TelewireRuntime};
pub use session::{BotSession, mask_credential};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
