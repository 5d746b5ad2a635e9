//! Scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use telewire_core::{TransportError, TransportResult};
use telewire_transport::{ApiResponse, ApiTransport, Params};

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub credential: String,
    pub method: String,
    pub params: Params,
    pub timeout: Option<Duration>,
}

/// Replays queued results in order; an empty queue answers `{ok: true, result: []}`.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<TransportResult<ApiResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn push(&self, result: TransportResult<ApiResponse>) {
        self.script.lock().push_back(result);
    }

    pub fn push_json(&self, body: Value) {
        self.push(Ok(ApiResponse::Json(body)));
    }

    pub fn push_updates(&self, updates: Value) {
        self.push_json(json!({ "ok": true, "result": updates }));
    }

    pub fn push_timeout(&self) {
        self.push(Err(TransportError::Timeout {
            method: "getUpdates".to_string(),
        }));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Calls currently inside `execute`.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApiTransport for ScriptedTransport {
    async fn execute(
        &self,
        credential: &str,
        method: &str,
        params: Params,
        timeout: Option<Duration>,
    ) -> TransportResult<ApiResponse> {
        self.calls.lock().push(RecordedCall {
            credential: credential.to_string(),
            method: method.to_string(),
            params,
            timeout,
        });

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ApiResponse::Json(json!({ "ok": true, "result": [] }))))
    }
}
