use crate::models::UserId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::debug;
use uuid::Uuid;

pub mod handlers;
pub mod message_types;
pub mod session;

/// Identifies one live connection, so a superseded connection cannot remove
/// the entry of the connection that replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

struct LiveHandle {
    id: ConnectionId,
    tx: UnboundedSender<String>,
}

/// Online users and the single live handle each one is reachable on.
///
/// The lock is synchronous and never held across an await, so a
/// [`Registration`] can release its entry from `Drop`.
#[derive(Default, Clone)]
pub struct ConnectionRegistry {
    // user_id -> newest live handle
    inner: Arc<RwLock<HashMap<UserId, LiveHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `tx` the handle for `user_id`, replacing any previous one.
    pub fn register(&self, user_id: UserId, tx: UnboundedSender<String>) -> ConnectionId {
        let id = ConnectionId::new();
        let previous = self.inner.write().insert(user_id, LiveHandle { id, tx });
        if previous.is_some() {
            debug!(user_id, "live connection superseded");
        }
        id
    }

    /// Remove the entry for `user_id` only if it still belongs to `connection`.
    pub fn unregister(&self, user_id: UserId, connection: ConnectionId) -> bool {
        let mut guard = self.inner.write();
        match guard.get(&user_id) {
            Some(handle) if handle.id == connection => {
                guard.remove(&user_id);
                true
            }
            _ => false,
        }
    }

    /// Push `payload` to `user_id` if online. Offline users are skipped.
    pub fn send_to(&self, user_id: UserId, payload: &str) -> bool {
        let stale = {
            let guard = self.inner.read();
            match guard.get(&user_id) {
                Some(handle) => match handle.tx.send(payload.to_string()) {
                    Ok(()) => return true,
                    Err(_) => handle.id,
                },
                None => return false,
            }
        };
        // Receiver is gone; drop the entry unless it was replaced meanwhile.
        self.unregister(user_id, stale);
        false
    }

    /// Deliver `payload` to every id independently; returns how many were reached.
    pub fn broadcast(&self, payload: &str, user_ids: &[UserId]) -> usize {
        user_ids
            .iter()
            .filter(|&&user_id| self.send_to(user_id, payload))
            .count()
    }

    /// Register a fresh channel for `user_id`; the entry lives as long as the
    /// returned [`Registration`].
    pub fn connect(&self, user_id: UserId) -> (Registration, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let id = self.register(user_id, tx);
        let registration = Registration {
            registry: self.clone(),
            user_id,
            id,
            released: false,
        };
        (registration, rx)
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.inner.read().contains_key(&user_id)
    }

    pub fn online_count(&self) -> usize {
        self.inner.read().len()
    }
}

/// Scoped registry entry for one session; released exactly once.
pub struct Registration {
    registry: ConnectionRegistry,
    user_id: UserId,
    id: ConnectionId,
    released: bool,
}

impl Registration {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.id
    }

    /// Idempotent.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            if self.registry.unregister(self.user_id, self.id) {
                debug!(user_id = self.user_id, "live connection unregistered");
            }
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registration_supersedes_old_handle() {
        let registry = ConnectionRegistry::new();
        let (_first, mut old_rx) = registry.connect(7);
        let (_second, mut new_rx) = registry.connect(7);

        assert!(registry.send_to(7, "hello"));
        assert_eq!(new_rx.try_recv().unwrap(), "hello");
        assert!(old_rx.try_recv().is_err());
    }

    #[test]
    fn test_stale_unregister_keeps_newer_handle() {
        let registry = ConnectionRegistry::new();
        let (first, _old_rx) = registry.connect(7);
        let (_second, mut new_rx) = registry.connect(7);

        drop(first);
        assert!(registry.is_online(7));
        assert!(registry.send_to(7, "still here"));
        assert_eq!(new_rx.try_recv().unwrap(), "still here");
    }

    #[test]
    fn test_release_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (mut registration, _rx) = registry.connect(1);
        registration.release();
        registration.release();
        drop(registration);
        assert!(!registry.is_online(1));
        assert_eq!(registry.online_count(), 0);
    }

    #[test]
    fn test_send_to_offline_user_is_dropped() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.send_to(99, "nobody"));
    }

    #[test]
    fn test_broadcast_is_independent_per_recipient() {
        let registry = ConnectionRegistry::new();
        let (_a, mut rx_a) = registry.connect(1);
        let (_b, rx_b) = registry.connect(2);
        let (_c, mut rx_c) = registry.connect(3);
        drop(rx_b);

        let reached = registry.broadcast("msg", &[1, 2, 3, 4]);
        assert_eq!(reached, 2);
        assert_eq!(rx_a.try_recv().unwrap(), "msg");
        assert_eq!(rx_c.try_recv().unwrap(), "msg");
        // Dead receiver was pruned.
        assert!(!registry.is_online(2));
    }

    #[tokio::test]
    async fn test_concurrent_connects_leave_one_handle() {
        let registry = ConnectionRegistry::new();
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let (registration, rx) = registry.connect(5);
                (registration, rx)
            }));
        }
        let mut held = Vec::new();
        for task in tasks {
            held.push(task.await.unwrap());
        }
        assert_eq!(registry.online_count(), 1);

        assert!(registry.send_to(5, "x"));
        let delivered = held
            .iter_mut()
            .filter_map(|(_, rx)| rx.try_recv().ok())
            .count();
        assert_eq!(delivered, 1);

        drop(held);
        assert!(!registry.is_online(5));
    }
}
