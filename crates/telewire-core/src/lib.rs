//! # Telewire Core
//!
//! The core engine of the telewire bot runtime.
//!
//! This crate provides the pieces that do not touch the network:
//!
//! - **Update model**: the opaque update envelope ([`Update`], [`UpdateKind`])
//! - **Matchers**: structural, alias, command and pattern match specifiers ([`Matcher`])
//! - **Event bus**: subscription list with tombstone removal and failure-isolated
//!   dispatch ([`EventBus`], [`SubscriptionId`], [`Callback`])
//! - **Errors**: the transport / remote / matcher error taxonomy
//!
//! ## Event Flow
//!
//! ```text
//! ┌────────┐  updates  ┌──────────┐  matchers  ┌────────────┐
//! │ Poller │──────────▶│ EventBus │───────────▶│  Callback  │
//! │(runtime)│          │  (core)  │───────────▶│  Callback  │
//! └────────┘           └──────────┘            └────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use telewire_core::{EventBus, Matcher, Update};
//!
//! let bus = EventBus::new();
//! bus.subscribe_sync(
//!     |update| {
//!         println!("command: {:?}", update.text());
//!         Ok(())
//!     },
//!     [Matcher::from("/start"), Matcher::pattern(r"^/help\b")?],
//! );
//!
//! let update: Update = serde_json::from_str(r#"{"update_id":1,"message":{"text":"/start"}}"#)?;
//! bus.push_event(update);
//! ```

pub mod bus;
pub mod error;
pub mod matcher;
pub mod update;

pub use bus::{Callback, EventBus, HandlerError, HandlerResult, SubscriptionId};
pub use error::{ApiError, ApiResult, MatcherError, TransportError, TransportResult};
pub use matcher::{EDIT_ALIAS, Matcher, TEXT_ALIAS, TextMatcher, matches_any};
pub use update::{Update, UpdateKind};

/// Prelude for common imports.
pub mod prelude {
    pub use super::bus::{EventBus, HandlerResult, SubscriptionId};
    pub use super::matcher::Matcher;
    pub use super::update::{Update, UpdateKind};
}
