//! Runtime orchestration.
//!
//! [`TelewireRuntime`] owns the session registry, the transport and the
//! poller. Obtaining the first session starts the poller (when called inside
//! a Tokio runtime); from then on every enabled session is ticked until the
//! runtime is stopped or dropped.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use telewire_runtime::TelewireRuntime;
//!
//! // Loads telewire.toml from the current directory, if any.
//! let runtime = TelewireRuntime::new()?;
//!
//! let bot = runtime.session("123456:ABC-DEF");
//! bot.subscribe_sync(|update| { println!("{:?}", update.text()); Ok(()) }, ["text"]);
//!
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use telewire_transport::{ApiTransport, RequestPipeline};

use crate::config::{ConfigLoader, TelewireConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::poller::{PollSettings, Poller, TickOutcome};
use crate::registry::SessionRegistry;
use crate::session::{BotSession, mask_credential};

enum PollerState {
    Idle,
    Running {
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    },
    Stopped,
}

/// Owns sessions and drives their polling.
pub struct TelewireRuntime {
    config: TelewireConfig,
    registry: Arc<SessionRegistry>,
    transport: Arc<dyn ApiTransport>,
    poller: Arc<Poller>,
    state: Mutex<PollerState>,
    autostart: bool,
}

impl TelewireRuntime {
    /// Creates a runtime from the default configuration sources.
    pub fn new() -> RuntimeResult<Self> {
        RuntimeBuilder::new().build()
    }

    /// Creates a runtime builder for custom configuration.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Validates the configuration, initializes logging and creates the HTTP
    /// request pipeline.
    pub fn from_config(config: &TelewireConfig) -> RuntimeResult<Self> {
        RuntimeBuilder::new().config(config.clone()).build()
    }

    fn assemble(
        config: TelewireConfig,
        transport: Arc<dyn ApiTransport>,
        autostart: bool,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let poller = Arc::new(Poller::new(
            Arc::clone(&registry),
            PollSettings::from(&config.polling),
        ));

        info!(
            base_url = %config.api.base_url,
            interval_ms = config.polling.interval_ms,
            long_poll_secs = config.polling.long_poll_secs,
            "Runtime initialized"
        );

        Self {
            config,
            registry,
            transport,
            poller,
            state: Mutex::new(PollerState::Idle),
            autostart,
        }
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &TelewireConfig {
        &self.config
    }

    /// The session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Returns the session for `credential`, creating it on first use.
    ///
    /// Calling this again with the same credential returns the same session,
    /// with its offset and subscriptions intact.
    pub fn session(&self, credential: &str) -> Arc<BotSession> {
        let (session, created) = self.registry.get_or_insert_with(credential, || {
            BotSession::new(
                credential,
                Arc::clone(&self.transport),
                self.config.polling.fetch_timeout(),
            )
        });

        if created && self.autostart {
            self.start_polling(false);
        }
        session
    }

    /// Looks up an existing session without creating one.
    pub fn get_session(&self, credential: &str) -> Option<Arc<BotSession>> {
        self.registry.get(credential)
    }

    /// Runs one tick for `credential` now, outside the poller schedule.
    pub async fn tick_now(&self, credential: &str) -> RuntimeResult<TickOutcome> {
        let session = self
            .registry
            .get(credential)
            .ok_or_else(|| RuntimeError::SessionNotFound(mask_credential(credential)))?;
        Ok(self.poller.tick(&session).await)
    }

    /// Whether the poller loop is running.
    pub fn is_polling(&self) -> bool {
        matches!(*self.state.lock(), PollerState::Running { .. })
    }

    /// Starts the poller. Returns `false` if it was already running or no
    /// Tokio runtime is available.
    pub fn start(&self) -> bool {
        self.start_polling(true)
    }

    fn start_polling(&self, restart: bool) -> bool {
        let mut state = self.state.lock();
        match *state {
            PollerState::Running { .. } => return false,
            PollerState::Stopped if !restart => return false,
            _ => {}
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No Tokio runtime available, poller start deferred");
            return false;
        };

        let cancel = CancellationToken::new();
        let task = handle.spawn(Arc::clone(&self.poller).run(cancel.clone()));
        *state = PollerState::Running {
            cancel,
            handle: task,
        };
        true
    }

    /// Stops the poller and waits for its loop to exit.
    ///
    /// Ticks already in flight finish on their own. Sessions stay registered.
    pub async fn stop(&self) -> RuntimeResult<()> {
        let (cancel, handle) = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, PollerState::Stopped) {
                PollerState::Running { cancel, handle } => (cancel, handle),
                previous => {
                    *state = previous;
                    warn!("Runtime is not running");
                    return Ok(());
                }
            }
        };

        info!("Stopping telewire runtime");
        cancel.cancel();
        if let Err(e) = handle.await {
            warn!(error = %e, "Poller task ended abnormally");
        }
        info!("Runtime stopped");
        Ok(())
    }

    /// Runs until Ctrl+C or SIGTERM.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start();
        info!("telewire runtime is now running. Press Ctrl+C to stop.");

        let signal = wait_for_shutdown().await;
        self.stop().await?;
        signal
    }

    /// Runs until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start();
        shutdown.await;
        self.stop().await
    }

    /// Session, enablement and tick counts.
    pub fn stats(&self) -> RuntimeStats {
        let registry = self.registry.stats();
        RuntimeStats {
            sessions: registry.sessions,
            enabled: registry.enabled,
            ticking: registry.ticking,
            polling: self.is_polling(),
        }
    }
}

impl Drop for TelewireRuntime {
    fn drop(&mut self) {
        if let PollerState::Running { cancel, .. } = &*self.state.lock() {
            cancel.cancel();
        }
    }
}

impl std::fmt::Debug for TelewireRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelewireRuntime")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

/// Snapshot of runtime activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub sessions: usize,
    pub enabled: usize,
    pub ticking: usize,
    pub polling: bool,
}

impl std::fmt::Display for RuntimeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} session(s), {} enabled, {} ticking, poller {}",
            self.sessions,
            self.enabled,
            self.ticking,
            if self.polling { "running" } else { "idle" }
        )
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`TelewireRuntime`].
///
/// ```rust,ignore
/// let runtime = TelewireRuntime::builder()
///     .config_file("deploy/telewire.toml")
///     .profile("production")
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<TelewireConfig>,
    transport: Option<Arc<dyn ApiTransport>>,
    init_logging: bool,
    autostart: bool,
}

impl RuntimeBuilder {
    /// Creates a builder that searches the current directory for config files.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            config: None,
            transport: None,
            init_logging: true,
            autostart: true,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Enables loading environment variables (enabled by default).
    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: TelewireConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses this configuration as is, skipping every other source.
    pub fn config(mut self, config: TelewireConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the HTTP request pipeline.
    pub fn transport(mut self, transport: Arc<dyn ApiTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Leaves the global `tracing` subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Whether creating the first session starts the poller (default: true).
    pub fn autostart_polling(mut self, enabled: bool) -> Self {
        self.autostart = enabled;
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> RuntimeResult<TelewireRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };
        validate_config(&config)?;

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let transport: Arc<dyn ApiTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(RequestPipeline::new(config.api.to_pipeline_config())?),
        };

        Ok(TelewireRuntime::assemble(config, transport, self.autostart))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use serde_json::json;
    use std::time::Duration;
    use telewire_core::Update;
    use tokio::sync::mpsc;

    fn runtime(transport: Arc<ScriptedTransport>, autostart: bool) -> TelewireRuntime {
        TelewireRuntime::builder()
            .config(TelewireConfig::default())
            .transport(transport)
            .without_logging()
            .autostart_polling(autostart)
            .build()
            .unwrap()
    }

    #[test]
    fn test_session_is_idempotent() {
        let rt = runtime(Arc::new(ScriptedTransport::new()), false);

        let a = rt.session("1:a");
        a.subscribe_sync(|_| Ok(()), ["text"]);
        a.advance_offset(12);

        let b = rt.session("1:a");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.highest_update_offset(), 12);
        assert_eq!(b.events().active_count(), 1);

        let c = rt.session("2:b");
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(rt.stats().sessions, 2);
    }

    #[test]
    fn test_separate_runtimes_do_not_share_sessions() {
        let first = runtime(Arc::new(ScriptedTransport::new()), false);
        let second = runtime(Arc::new(ScriptedTransport::new()), false);

        let a = first.session("1:a");
        let b = second.session("1:a");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_session_outside_tokio_defers_polling() {
        let rt = runtime(Arc::new(ScriptedTransport::new()), true);
        rt.session("1:a");
        assert!(!rt.is_polling());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = TelewireConfig::default();
        config.polling.interval_ms = 0;

        let result = TelewireRuntime::builder()
            .config(config)
            .transport(Arc::new(ScriptedTransport::new()))
            .without_logging()
            .build();
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }

    #[tokio::test]
    async fn test_tick_now_unknown_session() {
        let rt = runtime(Arc::new(ScriptedTransport::new()), false);
        let err = rt.tick_now("999:secret").await.unwrap_err();
        assert!(matches!(err, RuntimeError::SessionNotFound(ref masked) if masked == "999:***"));
    }

    #[tokio::test]
    async fn test_tick_now_dispatches() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_updates(json!([{ "update_id": 3, "message": { "text": "/start" } }]));
        let rt = runtime(Arc::clone(&transport), false);
        let session = rt.session("1:a");

        let outcome = tokio_test::assert_ok!(rt.tick_now("1:a").await);
        assert_eq!(outcome, TickOutcome::Dispatched(1));
        assert_eq!(session.highest_update_offset(), 3);
    }

    #[tokio::test]
    async fn test_first_session_starts_poller_and_delivers() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_updates(json!([
            { "update_id": 1, "message": { "text": "/start" } },
            { "update_id": 2, "channel_post": { "chat": { "id": 5 }, "date": 0, "message_id": 1 } }
        ]));
        let rt = runtime(Arc::clone(&transport), true);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = rt.session("1:a");
        assert!(rt.is_polling());
        session.subscribe(
            move |update: Arc<Update>| {
                let tx = tx.clone();
                async move {
                    tx.send(update.update_id())?;
                    Ok(())
                }
            },
            ["text"],
        );

        let mut seen = Vec::new();
        while seen.len() < 2 {
            let id = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap();
            seen.push(id.flatten());
        }
        seen.sort();
        assert_eq!(seen, [Some(1), Some(2)]);

        // Later fetches ask for updates after the highest id.
        while transport.call_count() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let calls = transport.calls();
        assert_eq!(
            calls[1].params.get("offset"),
            Some(&telewire_transport::Param::Value(json!(3)))
        );

        tokio_test::assert_ok!(rt.stop().await);
        assert!(!rt.is_polling());
    }

    #[tokio::test]
    async fn test_disabled_session_is_not_polled() {
        let transport = Arc::new(ScriptedTransport::new());
        let rt = runtime(Arc::clone(&transport), false);
        let session = rt.session("1:a");
        session.set_tick_enabled(false);

        rt.run_until(tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap();
        assert_eq!(transport.call_count(), 0);
        assert_eq!(rt.stats().enabled, 0);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let rt = runtime(Arc::new(ScriptedTransport::new()), true);
        assert!(rt.start());
        assert!(!rt.start());
        rt.stop().await.unwrap();
        rt.stop().await.unwrap();

        // Stopped runtimes do not restart on new sessions.
        rt.session("1:a");
        assert!(!rt.is_polling());
        assert_eq!(
            rt.stats().to_string(),
            "1 session(s), 1 enabled, 0 ticking, poller idle"
        );
    }
}
