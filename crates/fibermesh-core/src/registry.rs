//! Local entity registry
//!
//! Tracks which entities live on this fiber and owns their delivery
//! mailboxes. Presence here is what makes the router skip the network:
//! an envelope addressed to a registered entity goes straight to its
//! mailbox without ever touching a socket.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::trace;

use crate::envelope::Envelope;
use crate::types::EntityId;

/// Receiving side of a registered entity
///
/// Returned by [`EntityRegistry::register`]; dropped receivers cause the
/// entity to be pruned on the next delivery attempt.
pub struct EntityMailbox {
    id: EntityId,
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl EntityMailbox {
    /// The entity this mailbox belongs to
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// Receive the next envelope delivered to this entity
    ///
    /// Returns `None` once the entity is unregistered and the queue drains.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Non-blocking receive
    pub fn try_recv(&mut self) -> Result<Envelope, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}

/// Registry of entities local to one fiber
///
/// Cheap to clone; all clones share the same map.
#[derive(Clone, Default)]
pub struct EntityRegistry {
    inner: Arc<RwLock<HashMap<EntityId, mpsc::UnboundedSender<Envelope>>>>,
}

impl EntityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity, returning its mailbox
    ///
    /// Re-registering an id replaces the previous mailbox; the old
    /// receiver sees its stream end.
    pub fn register(&self, id: impl Into<EntityId>) -> EntityMailbox {
        let id = id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.write().insert(id.clone(), tx);
        EntityMailbox { id, rx }
    }

    /// Remove an entity registration
    pub fn unregister(&self, id: &EntityId) {
        self.inner.write().remove(id);
    }

    /// Whether an entity is registered locally
    pub fn has_entity(&self, id: &EntityId) -> bool {
        self.inner.read().contains_key(id)
    }

    /// Deliver an envelope to its destination entity
    ///
    /// Returns `false` when the destination is unknown or its mailbox has
    /// been dropped (the stale registration is pruned).
    pub fn deliver(&self, envelope: Envelope) -> bool {
        let to = envelope.to.clone();
        let sent = {
            let map = self.inner.read();
            match map.get(&to) {
                Some(tx) => tx.send(envelope).is_ok(),
                None => {
                    trace!(entity = %to, "No local entity for envelope");
                    return false;
                }
            }
        };
        if !sent {
            self.inner.write().remove(&to);
        }
        sent
    }

    /// Number of registered entities
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Drop all registrations, closing every mailbox
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FiberId, MessageId};
    use serde_json::json;

    fn envelope_to(to: &str) -> Envelope {
        Envelope {
            from: "tester".into(),
            to: to.into(),
            body: json!({"k": 1}),
            msg_id: MessageId::new(),
            message_type: None,
            in_reply_to: None,
            origin_fiber: FiberId::new(),
        }
    }

    #[tokio::test]
    async fn test_register_and_deliver() {
        let registry = EntityRegistry::new();
        let mut mailbox = registry.register("alice");

        assert!(registry.has_entity(&"alice".into()));
        assert!(registry.deliver(envelope_to("alice")));

        let received = mailbox.recv().await.unwrap();
        assert_eq!(received.to, "alice".into());
    }

    #[test]
    fn test_deliver_unknown_entity() {
        let registry = EntityRegistry::new();
        assert!(!registry.deliver(envelope_to("nobody")));
    }

    #[test]
    fn test_unregister() {
        let registry = EntityRegistry::new();
        let _mailbox = registry.register("alice");
        registry.unregister(&"alice".into());
        assert!(!registry.has_entity(&"alice".into()));
        assert!(!registry.deliver(envelope_to("alice")));
    }

    #[test]
    fn test_dropped_mailbox_pruned_on_delivery() {
        let registry = EntityRegistry::new();
        let mailbox = registry.register("alice");
        drop(mailbox);

        // Still registered until a delivery notices the closed channel.
        assert!(registry.has_entity(&"alice".into()));
        assert!(!registry.deliver(envelope_to("alice")));
        assert!(!registry.has_entity(&"alice".into()));
    }

    #[tokio::test]
    async fn test_reregister_replaces_mailbox() {
        let registry = EntityRegistry::new();
        let mut old = registry.register("alice");
        let mut new = registry.register("alice");

        assert!(registry.deliver(envelope_to("alice")));
        assert!(new.recv().await.is_some());
        // Old mailbox's sender was dropped by the replacement.
        assert!(old.recv().await.is_none());
    }

    #[test]
    fn test_clear() {
        let registry = EntityRegistry::new();
        let _a = registry.register("alice");
        let _b = registry.register("bob");
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert!(registry.is_empty());
    }
}
