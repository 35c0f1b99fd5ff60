//! In-flight registry: at most one live turn per client message id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info};

use super::abort::{AbortController, AbortOutcome, AbortReason};

/// Live turn as seen by the registry.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub client_message_id: String,
    pub controller: AbortController,
    pub started_at: Instant,
    generation: u64,
}

impl SessionHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Map from client message id to the controller of its live turn.
///
/// Cheap to clone; clones share the map.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    sessions: Arc<Mutex<HashMap<String, SessionHandle>>>,
    next_generation: Arc<AtomicU64>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new turn, superseding any live one with the same id.
    ///
    /// The previous controller is aborted with `new-send` and evicted under
    /// the same lock that inserts the new handle, so two controllers for one
    /// id are never live at once. The returned guard evicts the entry when
    /// dropped.
    pub fn register(&self, client_message_id: &str, controller: AbortController) -> InFlightGuard {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = SessionHandle {
            client_message_id: client_message_id.to_string(),
            controller,
            started_at: Instant::now(),
            generation,
        };

        let mut sessions = lock(&self.sessions);
        if let Some(previous) = sessions.remove(client_message_id) {
            let outcome = previous.controller.abort_with(AbortReason::NewSend);
            info!(
                "Superseded in-flight turn {} (generation {}): {:?}",
                client_message_id, previous.generation, outcome
            );
        }
        sessions.insert(client_message_id.to_string(), handle);
        drop(sessions);

        InFlightGuard {
            registry: self.clone(),
            client_message_id: client_message_id.to_string(),
            generation,
        }
    }

    /// Abort the live turn for `client_message_id`, honoring the allow-list.
    ///
    /// Returns `None` when no turn is in flight for that id.
    pub fn abort(&self, client_message_id: &str, reason: &str) -> Option<AbortOutcome> {
        let controller = lock(&self.sessions)
            .get(client_message_id)
            .map(|handle| handle.controller.clone())?;
        Some(controller.abort(reason))
    }

    pub fn is_in_flight(&self, client_message_id: &str) -> bool {
        lock(&self.sessions).contains_key(client_message_id)
    }

    /// Snapshot of the live handle for `client_message_id`.
    pub fn get(&self, client_message_id: &str) -> Option<SessionHandle> {
        lock(&self.sessions).get(client_message_id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, client_message_id: &str, generation: u64) {
        let mut sessions = lock(&self.sessions);
        let owned = sessions
            .get(client_message_id)
            .map(|handle| handle.generation == generation)
            .unwrap_or(false);
        if owned {
            sessions.remove(client_message_id);
            debug!("Released in-flight turn {}", client_message_id);
        }
    }
}

/// Evicts its registry entry on drop, unless a newer turn replaced it.
#[derive(Debug)]
pub struct InFlightGuard {
    registry: InFlightRegistry,
    client_message_id: String,
    generation: u64,
}

impl InFlightGuard {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry
            .release(&self.client_message_id, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_release() {
        let registry = InFlightRegistry::new();
        let guard = registry.register("m1", AbortController::new());
        assert!(registry.is_in_flight("m1"));
        drop(guard);
        assert!(!registry.is_in_flight("m1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_second_register_supersedes_first() {
        let registry = InFlightRegistry::new();
        let first = AbortController::new();
        let second = AbortController::new();

        let first_guard = registry.register("m1", first.clone());
        let second_guard = registry.register("m1", second.clone());

        assert!(first.is_aborted());
        assert_eq!(first.reason(), Some(AbortReason::NewSend));
        assert!(!second.is_aborted());
        assert_eq!(registry.len(), 1);
        assert!(second_guard.generation() > first_guard.generation());

        // The stale guard must not evict the newer turn.
        drop(first_guard);
        assert!(registry.is_in_flight("m1"));
        assert_eq!(registry.get("m1").unwrap().generation(), second_guard.generation());

        drop(second_guard);
        assert!(!registry.is_in_flight("m1"));
    }

    #[test]
    fn test_different_ids_coexist() {
        let registry = InFlightRegistry::new();
        let a = AbortController::new();
        let _ga = registry.register("a", a.clone());
        let _gb = registry.register("b", AbortController::new());
        assert_eq!(registry.len(), 2);
        assert!(!a.is_aborted());
    }

    #[test]
    fn test_abort_by_id() {
        let registry = InFlightRegistry::new();
        let controller = AbortController::new();
        let _guard = registry.register("m1", controller.clone());

        assert_eq!(registry.abort("m1", "bogus"), Some(AbortOutcome::Rejected));
        assert!(!controller.is_aborted());
        assert_eq!(registry.abort("m1", "user_cancel"), Some(AbortOutcome::Aborted));
        assert!(controller.is_aborted());
        assert_eq!(registry.abort("missing", "user_cancel"), None);
    }
}
