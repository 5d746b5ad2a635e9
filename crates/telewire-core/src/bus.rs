//! Event bus for a single bot session.
//!
//! The [`EventBus`] holds an ordered list of subscriptions. Every pushed
//! [`Update`] is checked against every subscription's matchers and each
//! matching callback is invoked:
//!
//! 1. Subscriptions are evaluated in registration order, all of them, always.
//! 2. Synchronous callbacks run inline; errors and panics are logged.
//! 3. Asynchronous callbacks are spawned onto the current Tokio runtime;
//!    their errors and panics are logged from the spawned task.
//!
//! Unsubscribing tombstones the slot (no-op callback, empty matcher list)
//! instead of removing it, so slot positions stay stable for the lifetime of
//! the bus.
//!
//! ```rust,ignore
//! use telewire_core::EventBus;
//!
//! let bus = EventBus::new();
//! let id = bus.subscribe(
//!     |update| async move {
//!         println!("got {:?}", update.text());
//!         Ok(())
//!     },
//!     ["/start", "callback_query"],
//! );
//! bus.unsubscribe(id);
//! ```

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use tracing::{Level, debug, span, trace, warn};
use uuid::Uuid;

use crate::matcher::{Matcher, matches_any};
use crate::update::Update;

/// Error type callbacks may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type callbacks return.
pub type HandlerResult = Result<(), HandlerError>;

type SyncFn = dyn Fn(&Update) -> HandlerResult + Send + Sync;
type AsyncFn = dyn Fn(Arc<Update>) -> BoxFuture<'static, HandlerResult> + Send + Sync;

/// A subscription callback, either completing inline or returning a future.
#[derive(Clone)]
pub enum Callback {
    /// Runs to completion on the dispatching task.
    Sync(Arc<SyncFn>),
    /// Returns a future that is spawned and never awaited by the dispatcher.
    Async(Arc<AsyncFn>),
}

impl Callback {
    /// Wraps a synchronous function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&Update) -> HandlerResult + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Wraps an asynchronous function.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<Update>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::Async(Arc::new(move |update| f(update).boxed()))
    }

    fn noop() -> Self {
        Self::Sync(Arc::new(|_| Ok(())))
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Callback::Sync"),
            Self::Async(_) => f.write_str("Callback::Async"),
        }
    }
}

/// Opaque, process-unique subscription handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One subscription slot. `id` is `None` once tombstoned.
struct Slot {
    id: Option<SubscriptionId>,
    callback: Callback,
    matchers: Arc<[Matcher]>,
}

/// The per-session subscription list and dispatcher.
///
/// `EventBus` is `Send + Sync`; subscribing from inside a callback is fine
/// because dispatch works on a snapshot of the slots.
#[derive(Default)]
pub struct EventBus {
    slots: RwLock<Vec<Slot>>,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes an asynchronous callback.
    ///
    /// The callback's future is spawned on the current Tokio runtime; a
    /// returned error or a panic is logged and never reaches the poller.
    pub fn subscribe<F, Fut, I>(&self, callback: F, matchers: I) -> SubscriptionId
    where
        F: Fn(Arc<Update>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
        I: IntoIterator,
        I::Item: Into<Matcher>,
    {
        self.subscribe_callback(Callback::from_async(callback), matchers)
    }

    /// Subscribes a synchronous callback.
    pub fn subscribe_sync<F, I>(&self, callback: F, matchers: I) -> SubscriptionId
    where
        F: Fn(&Update) -> HandlerResult + Send + Sync + 'static,
        I: IntoIterator,
        I::Item: Into<Matcher>,
    {
        self.subscribe_callback(Callback::from_fn(callback), matchers)
    }

    /// Subscribes a pre-built callback.
    pub fn subscribe_callback<I>(&self, callback: Callback, matchers: I) -> SubscriptionId
    where
        I: IntoIterator,
        I::Item: Into<Matcher>,
    {
        let id = SubscriptionId::new();
        let matchers: Arc<[Matcher]> = matchers.into_iter().map(Into::into).collect();

        debug!(
            subscription = %id,
            matchers = matchers.len(),
            kind = ?callback,
            "Subscribed callback"
        );

        self.slots.write().push(Slot {
            id: Some(id),
            callback,
            matchers,
        });
        id
    }

    /// Tombstones the subscription with this handle.
    ///
    /// Returns `true` if an active subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut found = false;
        for slot in self.slots.write().iter_mut() {
            if slot.id == Some(id) {
                slot.id = None;
                slot.callback = Callback::noop();
                slot.matchers = Arc::from(Vec::new());
                found = true;
            }
        }

        if found {
            debug!(subscription = %id, "Unsubscribed callback");
        }
        found
    }

    /// Total number of slots, tombstones included.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Returns `true` if nothing was ever subscribed.
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Number of live (non-tombstoned) subscriptions.
    pub fn active_count(&self) -> usize {
        self.slots.read().iter().filter(|s| s.id.is_some()).count()
    }

    /// Dispatches an update to every matching subscription.
    ///
    /// Returns the number of callbacks invoked. Never waits for asynchronous
    /// callbacks and never propagates callback failures.
    pub fn push_event(&self, update: Update) -> usize {
        let span = span!(Level::DEBUG, "push_event", update_id = ?update.update_id());
        let _enter = span.enter();

        let snapshot: Vec<(Option<SubscriptionId>, Callback, Arc<[Matcher]>)> = self
            .slots
            .read()
            .iter()
            .map(|s| (s.id, s.callback.clone(), Arc::clone(&s.matchers)))
            .collect();

        let update = Arc::new(update);
        let mut fired = 0;

        for (id, callback, matchers) in snapshot {
            if !matches_any(&matchers, &update) {
                continue;
            }
            trace!(subscription = ?id, "Subscription matched, invoking callback");
            fired += 1;
            invoke(id, &callback, &update);
        }

        fired
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("slots", &self.len())
            .field("active", &self.active_count())
            .finish()
    }
}

fn invoke(id: Option<SubscriptionId>, callback: &Callback, update: &Arc<Update>) {
    match callback {
        Callback::Sync(f) => match std::panic::catch_unwind(AssertUnwindSafe(|| f(update))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(subscription = ?id, error = %e, "Callback threw an error"),
            Err(panic) => {
                warn!(subscription = ?id, panic = %panic_message(&*panic), "Callback panicked")
            }
        },
        Callback::Async(f) => {
            let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| f(Arc::clone(update)))) {
                Ok(fut) => fut,
                Err(panic) => {
                    warn!(subscription = ?id, panic = %panic_message(&*panic), "Callback panicked");
                    return;
                }
            };

            let Ok(handle) = tokio::runtime::Handle::try_current() else {
                warn!(subscription = ?id, "No Tokio runtime available, dropping async callback");
                return;
            };

            handle.spawn(async move {
                match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(subscription = ?id, error = %e, "Async callback rejected")
                    }
                    Err(panic) => {
                        warn!(subscription = ?id, panic = %panic_message(&*panic), "Async callback panicked")
                    }
                }
            });
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn update(value: Value) -> Update {
        Update::from_value(value).unwrap()
    }

    fn text_update(text: &str) -> Update {
        update(json!({ "update_id": 1, "message": { "text": text } }))
    }

    fn counter_callback(counter: Arc<AtomicUsize>) -> impl Fn(&Update) -> HandlerResult {
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_push_event_fires_every_matching_subscription() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        bus.subscribe_sync(counter_callback(Arc::clone(&counter)), ["/start"]);
        bus.subscribe_sync(counter_callback(Arc::clone(&counter)), ["start"]);
        bus.subscribe_sync(counter_callback(Arc::clone(&counter)), ["callback_query"]);

        let fired = bus.push_event(text_update("/start now"));
        assert_eq!(fired, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_tombstones_slot() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let id = bus.subscribe_sync(counter_callback(Arc::clone(&counter)), ["text"]);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));

        assert_eq!(bus.push_event(text_update("hello")), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(bus.len(), 1);
        assert_eq!(bus.active_count(), 0);
    }

    #[test]
    fn test_unsubscribe_unknown_id() {
        let bus = EventBus::new();
        let other = EventBus::new();
        let id = other.subscribe_sync(|_| Ok(()), ["text"]);
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn test_ids_are_unique() {
        let bus = EventBus::new();
        let a = bus.subscribe_sync(|_| Ok(()), ["a"]);
        let b = bus.subscribe_sync(|_| Ok(()), ["a"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_failing_callbacks_do_not_stop_siblings() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        bus.subscribe_sync(|_| Err("boom".into()), ["text"]);
        bus.subscribe_sync(|_| panic!("callback exploded"), ["text"]);
        bus.subscribe_sync(counter_callback(Arc::clone(&counter)), ["text"]);

        assert_eq!(bus.push_event(text_update("hi")), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscribe_from_inside_callback() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.subscribe_sync(
            move |_| {
                inner.subscribe_sync(|_| Ok(()), ["text"]);
                Ok(())
            },
            ["text"],
        );

        bus.push_event(text_update("hi"));
        assert_eq!(bus.len(), 2);
    }

    #[test]
    fn test_async_callback_without_runtime_is_dropped() {
        let bus = EventBus::new();
        bus.subscribe(|_| async { Ok(()) }, ["text"]);
        // Still counted as matched, but nothing is spawned.
        assert_eq!(bus.push_event(text_update("hi")), 1);
    }

    #[tokio::test]
    async fn test_async_callback_receives_update() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        bus.subscribe(
            move |update: Arc<Update>| {
                let tx = tx.clone();
                async move {
                    tx.send(update.text().map(str::to_string))?;
                    Ok(())
                }
            },
            ["/echo"],
        );

        bus.push_event(text_update("/echo hi"));

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(received, Some(Some("/echo hi".to_string())));
    }

    async fn reject(_update: Arc<Update>) -> HandlerResult {
        Err("rejected".into())
    }

    async fn explode(_update: Arc<Update>) -> HandlerResult {
        panic!("async boom")
    }

    #[tokio::test]
    async fn test_async_rejection_is_contained() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        bus.subscribe(reject, ["text"]);
        bus.subscribe(explode, ["text"]);
        bus.subscribe_sync(counter_callback(Arc::clone(&counter)), ["text"]);

        assert_eq!(bus.push_event(text_update("hi")), 3);
        tokio::task::yield_now().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
