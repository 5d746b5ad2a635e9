//! The poller and the tick state machine.
//!
//! A tick for one credential:
//!
//! 1. Take the in-flight guard, or return at once if a tick is running.
//! 2. Request updates after the stored offset (from the start if it is 0).
//! 3. `ok: false` or a non-JSON body: warn and finish, offset untouched.
//! 4. Otherwise raise the offset to each update's id and dispatch it.
//! 5. A transport failure sleeps the backoff and retries once, still holding
//!    the guard. A second failure is logged and the tick gives up until the
//!    next schedule.
//!
//! The [`Poller`] loop wakes every `interval` and spawns a tick for every
//! session that is enabled and idle. Ticks for different credentials run
//! concurrently.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, trace, warn};

use telewire_core::{TransportError, Update};
use telewire_transport::Params;

use crate::config::PollingConfig;
use crate::registry::SessionRegistry;
use crate::session::BotSession;

/// How a tick ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick for the credential was in flight; nothing was done.
    Skipped,
    /// The fetch succeeded; this many updates were pushed to the event bus.
    Dispatched(usize),
    /// The remote refused the fetch (`ok: false` or a non-envelope body).
    Rejected,
    /// The fetch and its single retry both failed.
    Failed,
}

/// Fetch parameters and timings shared by all ticks.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub long_poll_secs: u64,
    pub limit: Option<u32>,
    pub allowed_updates: Option<Vec<String>>,
    pub retry_backoff: Duration,
}

impl From<&PollingConfig> for PollSettings {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            long_poll_secs: config.long_poll_secs,
            limit: config.limit,
            allowed_updates: config.allowed_updates.clone(),
            retry_backoff: config.retry_backoff(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from(&PollingConfig::default())
    }
}

/// Drives ticks for every session in a registry.
#[derive(Debug)]
pub struct Poller {
    registry: Arc<SessionRegistry>,
    settings: PollSettings,
}

impl Poller {
    pub fn new(registry: Arc<SessionRegistry>, settings: PollSettings) -> Self {
        Self { registry, settings }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Runs one tick for `session`.
    pub async fn tick(&self, session: &BotSession) -> TickOutcome {
        let Some(_guard) = self.registry.try_begin_tick(session.credential()) else {
            trace!(bot = %session.masked_credential(), "Tick already in flight, skipping");
            return TickOutcome::Skipped;
        };

        match self.fetch_and_dispatch(session).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    bot = %session.masked_credential(),
                    error = %e,
                    backoff_ms = self.settings.retry_backoff.as_millis() as u64,
                    "Tick failed, retrying after backoff"
                );
                tokio::time::sleep(self.settings.retry_backoff).await;

                match self.fetch_and_dispatch(session).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!(
                            bot = %session.masked_credential(),
                            error = %e,
                            "Tick failed again due to a network error, waiting for next schedule"
                        );
                        TickOutcome::Failed
                    }
                }
            }
        }
    }

    fn fetch_params(&self, offset: i64) -> Params {
        let mut params = Params::new();
        if offset != 0 {
            params.insert("offset", offset.saturating_add(1));
        }
        if self.settings.long_poll_secs > 0 {
            params.insert("timeout", Value::from(self.settings.long_poll_secs));
        }
        if let Some(limit) = self.settings.limit {
            params.insert("limit", Value::from(limit));
        }
        if let Some(allowed) = &self.settings.allowed_updates {
            params.insert("allowed_updates", Value::from(allowed.clone()));
        }
        params
    }

    async fn fetch_and_dispatch(
        &self,
        session: &BotSession,
    ) -> Result<TickOutcome, TransportError> {
        let offset = session.highest_update_offset();
        let params = self.fetch_params(offset);

        let response = session
            .transport()
            .execute(
                session.credential(),
                "getUpdates",
                params,
                Some(session.fetch_timeout()),
            )
            .await?;

        let updates = match response.into_result() {
            Ok(Value::Array(updates)) => updates,
            Ok(other) => {
                warn!(
                    bot = %session.masked_credential(),
                    result = %other,
                    "getUpdates returned a non-array result"
                );
                return Ok(TickOutcome::Rejected);
            }
            Err(e) => {
                warn!(
                    bot = %session.masked_credential(),
                    error = %e,
                    "Remote rejected getUpdates"
                );
                return Ok(TickOutcome::Rejected);
            }
        };

        let count = updates.len();
        if count > 0 {
            debug!(bot = %session.masked_credential(), offset, count, "Fetched updates");
        }

        let mut dispatched = 0;
        for value in updates {
            let Some(update) = Update::from_value(value) else {
                warn!(bot = %session.masked_credential(), "Skipping update that is not an object");
                continue;
            };
            dispatched += 1;
            let update_id = update.update_id();
            if let Some(id) = update_id {
                session.advance_offset(id);
            }

            let pushed =
                std::panic::catch_unwind(AssertUnwindSafe(|| session.push_event(update)));
            if pushed.is_err() {
                warn!(
                    bot = %session.masked_credential(),
                    ?update_id,
                    "Dispatch panicked, continuing with batch"
                );
            }
        }

        Ok(TickOutcome::Dispatched(dispatched))
    }

    /// Schedules ticks every `interval` until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_ms = self.settings.interval.as_millis() as u64,
            "Poller started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.schedule();
                }
            }
        }

        info!("Poller stopped");
    }

    /// Spawns a tick for every enabled, idle session. Returns how many were spawned.
    pub fn schedule(self: &Arc<Self>) -> usize {
        let mut spawned = 0;
        for session in self.registry.sessions() {
            if !session.is_tick_enabled() || self.registry.is_ticking(session.credential()) {
                continue;
            }

            let poller = Arc::clone(self);
            let span = info_span!("tick", bot = %session.masked_credential());
            tokio::spawn(
                async move {
                    let result = AssertUnwindSafe(poller.tick(&session))
                        .catch_unwind()
                        .await;
                    if result.is_err() {
                        warn!("Tick panicked");
                    }
                }
                .instrument(span),
            );
            spawned += 1;
        }
        spawned
    }
}
