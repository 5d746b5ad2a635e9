//! One bot account.
//!
//! A [`BotSession`] is the per-credential state the poller works on: the
//! event bus, the highest update id seen so far, and the tick-enable flag.
//! Sessions are only created through
//! [`TelewireRuntime::session`](crate::TelewireRuntime::session), which
//! returns the same instance for the same credential.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use telewire_core::{
    ApiResult, Callback, EventBus, HandlerResult, Matcher, SubscriptionId, Update,
};
use telewire_transport::{ApiResponse, ApiTransport, Params};

/// Hides the secret half of a bot token.
///
/// `123456:AAE...` becomes `123456:***`; a token without a bot id prefix is
/// hidden completely.
pub fn mask_credential(credential: &str) -> String {
    match credential.split_once(':') {
        Some((bot_id, _)) if !bot_id.is_empty() => format!("{bot_id}:***"),
        _ => "***".to_string(),
    }
}

/// Runtime state for one credential.
pub struct BotSession {
    credential: String,
    masked: String,
    tick_enabled: AtomicBool,
    highest_update: AtomicI64,
    bus: EventBus,
    transport: Arc<dyn ApiTransport>,
    fetch_timeout: Duration,
}

impl BotSession {
    pub(crate) fn new(
        credential: impl Into<String>,
        transport: Arc<dyn ApiTransport>,
        fetch_timeout: Duration,
    ) -> Self {
        let credential = credential.into();
        Self {
            masked: mask_credential(&credential),
            credential,
            tick_enabled: AtomicBool::new(true),
            highest_update: AtomicI64::new(0),
            bus: EventBus::new(),
            transport,
            fetch_timeout,
        }
    }

    /// The bot token.
    pub fn credential(&self) -> &str {
        &self.credential
    }

    /// The token with its secret part hidden, safe for logs.
    pub fn masked_credential(&self) -> &str {
        &self.masked
    }

    /// Whether the poller schedules ticks for this session.
    pub fn is_tick_enabled(&self) -> bool {
        self.tick_enabled.load(Ordering::Acquire)
    }

    /// Enables or disables ticking. A tick already in flight is not cancelled.
    pub fn set_tick_enabled(&self, enabled: bool) {
        let previous = self.tick_enabled.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            debug!(bot = %self.masked, enabled, "Ticking toggled");
        }
    }

    /// Highest update id seen. `0` means nothing has been fetched yet.
    pub fn highest_update_offset(&self) -> i64 {
        self.highest_update.load(Ordering::Acquire)
    }

    /// Raises the stored offset to `update_id` if larger. Returns the new value.
    pub(crate) fn advance_offset(&self, update_id: i64) -> i64 {
        let previous = self.highest_update.fetch_max(update_id, Ordering::AcqRel);
        previous.max(update_id)
    }

    /// The session's event bus.
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Subscribes an asynchronous callback. See [`EventBus::subscribe`].
    pub fn subscribe<F, Fut, I>(&self, callback: F, matchers: I) -> SubscriptionId
    where
        F: Fn(Arc<Update>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
        I: IntoIterator,
        I::Item: Into<Matcher>,
    {
        self.bus.subscribe(callback, matchers)
    }

    /// Subscribes a synchronous callback.
    pub fn subscribe_sync<F, I>(&self, callback: F, matchers: I) -> SubscriptionId
    where
        F: Fn(&Update) -> HandlerResult + Send + Sync + 'static,
        I: IntoIterator,
        I::Item: Into<Matcher>,
    {
        self.bus.subscribe_sync(callback, matchers)
    }

    /// Subscribes a pre-built callback.
    pub fn subscribe_callback<I>(&self, callback: Callback, matchers: I) -> SubscriptionId
    where
        I: IntoIterator,
        I::Item: Into<Matcher>,
    {
        self.bus.subscribe_callback(callback, matchers)
    }

    /// Removes a subscription. Returns `false` if it was not active.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Dispatches an update as if it had been fetched.
    pub fn push_event(&self, update: Update) -> usize {
        self.bus.push_event(update)
    }

    /// Executes any remote operation with this session's credential.
    ///
    /// Returns the normalised body; an `ok: false` envelope is a successful
    /// return here. Use [`call`](Self::call) to interpret the envelope.
    pub async fn request(&self, method: &str, params: Params) -> ApiResult<ApiResponse> {
        debug!(bot = %self.masked, method, "Calling remote method");
        Ok(self
            .transport
            .execute(&self.credential, method, params, None)
            .await?)
    }

    /// Like [`request`](Self::request) with an explicit timeout.
    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: Params,
        timeout: Duration,
    ) -> ApiResult<ApiResponse> {
        debug!(bot = %self.masked, method, ?timeout, "Calling remote method");
        Ok(self
            .transport
            .execute(&self.credential, method, params, Some(timeout))
            .await?)
    }

    /// Executes a remote operation and unwraps the `result` field.
    ///
    /// `ok: false` becomes [`ApiError::Remote`](telewire_core::ApiError::Remote)
    /// carrying the remote description and error code.
    pub async fn call(&self, method: &str, params: Params) -> ApiResult<Value> {
        self.request(method, params).await?.into_result()
    }

    /// Fetches pending updates. Uses the long fetch timeout.
    pub async fn get_updates(&self, params: Params) -> ApiResult<ApiResponse> {
        self.request_with_timeout("getUpdates", params, self.fetch_timeout)
            .await
    }

    pub(crate) fn transport(&self) -> &Arc<dyn ApiTransport> {
        &self.transport
    }

    pub(crate) fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }
}

impl fmt::Debug for BotSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotSession")
            .field("credential", &self.masked)
            .field("tick_enabled", &self.is_tick_enabled())
            .field("highest_update", &self.highest_update_offset())
            .field("events", &self.bus)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use serde_json::json;
    use telewire_core::ApiError;

    fn session(transport: Arc<ScriptedTransport>) -> BotSession {
        BotSession::new("123456:SECRET", transport, Duration::from_secs(60))
    }

    #[test]
    fn test_mask_credential() {
        assert_eq!(mask_credential("123456:ABC-DEF"), "123456:***");
        assert_eq!(mask_credential("no-colon-token"), "***");
        assert_eq!(mask_credential(":leading"), "***");
    }

    #[test]
    fn test_debug_hides_secret() {
        let s = session(Arc::new(ScriptedTransport::new()));
        let rendered = format!("{s:?}");
        assert!(rendered.contains("123456:***"));
        assert!(!rendered.contains("SECRET"));
    }

    #[test]
    fn test_advance_offset_never_decreases() {
        let s = session(Arc::new(ScriptedTransport::new()));
        assert_eq!(s.highest_update_offset(), 0);
        assert_eq!(s.advance_offset(10), 10);
        assert_eq!(s.advance_offset(4), 10);
        assert_eq!(s.advance_offset(11), 11);
        assert_eq!(s.highest_update_offset(), 11);
    }

    #[test]
    fn test_tick_enabled_toggle() {
        let s = session(Arc::new(ScriptedTransport::new()));
        assert!(s.is_tick_enabled());
        s.set_tick_enabled(false);
        assert!(!s.is_tick_enabled());
    }

    #[tokio::test]
    async fn test_request_passes_method_and_credential() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(json!({ "ok": true, "result": { "id": 1, "is_bot": true } }));
        let s = session(Arc::clone(&transport));

        let me = s.call("getMe", Params::new()).await.unwrap();
        assert_eq!(me["is_bot"], json!(true));

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, "getMe");
        assert_eq!(calls[0].credential, "123456:SECRET");
        assert_eq!(calls[0].timeout, None);
    }

    #[tokio::test]
    async fn test_call_surfaces_remote_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(json!({
            "ok": false,
            "error_code": 403,
            "description": "Forbidden: bot was blocked by the user"
        }));
        let s = session(Arc::clone(&transport));

        let err = s
            .call("sendMessage", Params::new().with("chat_id", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Remote { error_code: Some(403), .. }));
    }

    #[tokio::test]
    async fn test_get_updates_uses_fetch_timeout() {
        let transport = Arc::new(ScriptedTransport::new());
        let s = session(Arc::clone(&transport));

        s.get_updates(Params::new()).await.unwrap();
        assert_eq!(transport.calls()[0].timeout, Some(Duration::from_secs(60)));
    }
}
