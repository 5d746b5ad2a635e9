//! Session registry and in-flight guard.
//!
//! The registry maps each credential to its [`BotSession`] and records which
//! credentials currently have a tick executing. It is owned by one
//! [`TelewireRuntime`](crate::TelewireRuntime), so independent runtimes (and
//! tests) never share sessions.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::session::BotSession;

/// Credential → session, plus credential → "tick in flight".
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<BotSession>>>,
    in_flight: Mutex<HashMap<String, bool>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `credential`, creating it with `create` on first use.
    ///
    /// The boolean is `true` when the session was created by this call.
    pub fn get_or_insert_with<F>(&self, credential: &str, create: F) -> (Arc<BotSession>, bool)
    where
        F: FnOnce() -> BotSession,
    {
        if let Some(existing) = self.sessions.read().get(credential) {
            return (Arc::clone(existing), false);
        }

        let mut sessions = self.sessions.write();
        // Another caller may have won the race between the two locks.
        if let Some(existing) = sessions.get(credential) {
            return (Arc::clone(existing), false);
        }

        let session = Arc::new(create());
        sessions.insert(credential.to_string(), Arc::clone(&session));
        self.in_flight.lock().insert(credential.to_string(), false);

        info!(bot = %session.masked_credential(), "Registered bot session");
        (session, true)
    }

    /// Looks up a session.
    pub fn get(&self, credential: &str) -> Option<Arc<BotSession>> {
        self.sessions.read().get(credential).cloned()
    }

    /// Snapshot of all sessions.
    pub fn sessions(&self) -> Vec<Arc<BotSession>> {
        self.sessions.read().values().cloned().collect()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Whether a tick is executing for `credential`.
    pub fn is_ticking(&self, credential: &str) -> bool {
        self.in_flight
            .lock()
            .get(credential)
            .copied()
            .unwrap_or(false)
    }

    /// Marks `credential` as ticking, unless it already is.
    ///
    /// The flag is cleared when the returned guard drops, on every exit path
    /// of the tick.
    pub fn try_begin_tick(self: &Arc<Self>, credential: &str) -> Option<TickGuard> {
        let mut in_flight = self.in_flight.lock();
        let flag = in_flight.entry(credential.to_string()).or_insert(false);
        if *flag {
            return None;
        }
        *flag = true;
        Some(TickGuard {
            registry: Arc::clone(self),
            credential: credential.to_string(),
        })
    }

    /// Counts of registered, enabled and ticking sessions.
    pub fn stats(&self) -> RegistryStats {
        let sessions = self.sessions.read();
        let in_flight = self.in_flight.lock();
        RegistryStats {
            sessions: sessions.len(),
            enabled: sessions.values().filter(|s| s.is_tick_enabled()).count(),
            ticking: in_flight.values().filter(|t| **t).count(),
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Holds the in-flight flag of one credential.
#[must_use = "the tick is marked idle again as soon as the guard drops"]
pub struct TickGuard {
    registry: Arc<SessionRegistry>,
    credential: String,
}

impl Drop for TickGuard {
    fn drop(&mut self) {
        if let Some(flag) = self.registry.in_flight.lock().get_mut(&self.credential) {
            *flag = false;
        }
        debug!("Tick guard released");
    }
}

/// Statistics about the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Registered sessions.
    pub sessions: usize,
    /// Sessions with ticking enabled.
    pub enabled: usize,
    /// Sessions with a tick in flight.
    pub ticking: usize,
}

impl std::fmt::Display for RegistryStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Sessions: {} total ({} enabled, {} ticking)",
            self.sessions, self.enabled, self.ticking
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use std::time::Duration;

    fn make(credential: &str) -> BotSession {
        BotSession::new(
            credential,
            Arc::new(ScriptedTransport::new()),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_get_or_insert_is_idempotent() {
        let registry = SessionRegistry::new();
        let (a, created_a) = registry.get_or_insert_with("1:a", || make("1:a"));
        let (b, created_b) = registry.get_or_insert_with("1:a", || make("1:a"));

        assert!(created_a);
        assert!(!created_b);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_guard_is_exclusive_per_credential() {
        let registry = Arc::new(SessionRegistry::new());
        registry.get_or_insert_with("1:a", || make("1:a"));
        registry.get_or_insert_with("2:b", || make("2:b"));

        let guard = registry.try_begin_tick("1:a").unwrap();
        assert!(registry.is_ticking("1:a"));
        assert!(registry.try_begin_tick("1:a").is_none());

        // A different credential is unaffected.
        let other = registry.try_begin_tick("2:b");
        assert!(other.is_some());
        assert_eq!(registry.stats().ticking, 2);

        drop(guard);
        assert!(!registry.is_ticking("1:a"));
        assert!(registry.try_begin_tick("1:a").is_some());
    }

    #[test]
    fn test_stats_counts_enabled() {
        let registry = SessionRegistry::new();
        let (a, _) = registry.get_or_insert_with("1:a", || make("1:a"));
        registry.get_or_insert_with("2:b", || make("2:b"));
        a.set_tick_enabled(false);

        let stats = registry.stats();
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.enabled, 1);
        assert_eq!(stats.ticking, 0);
        assert_eq!(
            stats.to_string(),
            "Sessions: 2 total (1 enabled, 0 ticking)"
        );
    }
}
