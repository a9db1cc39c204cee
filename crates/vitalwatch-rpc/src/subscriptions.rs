//! Subscription descriptors owned by the supervisor.
//!
//! Every `eth_subscribe` is recorded as a descriptor under a stable local
//! [`SubscriptionKey`]. The node's subscription id is only a *binding* of that
//! key for the current connection: on reconnect all bindings are cleared,
//! every descriptor is re-issued, and the new ids are bound to the same keys,
//! so notifications keep flowing to the receiver the caller already holds.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tokio::sync::mpsc;

/// Local, connection-independent identity of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey(pub u64);

impl std::fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// What to send to re-create a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionDescriptor {
    /// The subscription type (`"newHeads"`, `"logs"`).
    pub kind: String,
    /// Parameters after the kind, e.g. the log filter.
    pub params: Vec<Value>,
}

struct Entry {
    descriptor: SubscriptionDescriptor,
    sender: mpsc::UnboundedSender<Value>,
    server_id: Option<String>,
}

/// Registry of live subscriptions. Not shared: only the supervisor task
/// touches it.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: BTreeMap<SubscriptionKey, Entry>,
    bindings: HashMap<String, SubscriptionKey>,
    next_key: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a descriptor. Notifications for it go to `sender` once bound.
    pub fn register(
        &mut self,
        descriptor: SubscriptionDescriptor,
        sender: mpsc::UnboundedSender<Value>,
    ) -> SubscriptionKey {
        self.next_key += 1;
        let key = SubscriptionKey(self.next_key);
        self.entries.insert(
            key,
            Entry {
                descriptor,
                sender,
                server_id: None,
            },
        );
        key
    }

    /// Attach the node's id for the current connection. Returns `false` if
    /// the key was removed in the meantime.
    pub fn bind(&mut self, key: SubscriptionKey, server_id: String) -> bool {
        let Some(entry) = self.entries.get_mut(&key) else {
            return false;
        };
        if let Some(old) = entry.server_id.replace(server_id.clone()) {
            self.bindings.remove(&old);
        }
        self.bindings.insert(server_id, key);
        true
    }

    /// Forget every node id. Called when the connection is replaced.
    pub fn clear_bindings(&mut self) {
        self.bindings.clear();
        for entry in self.entries.values_mut() {
            entry.server_id = None;
        }
    }

    /// Forward a notification. Returns `false` if the id is not bound or the
    /// receiver has been dropped.
    pub fn dispatch(&self, server_id: &str, message: Value) -> bool {
        let Some(entry) = self
            .bindings
            .get(server_id)
            .and_then(|key| self.entries.get(key))
        else {
            return false;
        };
        entry.sender.send(message).is_ok()
    }

    pub fn server_id(&self, key: SubscriptionKey) -> Option<&str> {
        self.entries.get(&key)?.server_id.as_deref()
    }

    pub fn contains(&self, key: SubscriptionKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Drop a subscription and its binding. Its receiver sees end-of-stream.
    pub fn remove(&mut self, key: SubscriptionKey) -> Option<SubscriptionDescriptor> {
        let entry = self.entries.remove(&key)?;
        if let Some(id) = entry.server_id {
            self.bindings.remove(&id);
        }
        Some(entry.descriptor)
    }

    /// All descriptors in registration order, for re-issuing after reconnect.
    pub fn descriptors(&self) -> Vec<(SubscriptionKey, SubscriptionDescriptor)> {
        self.entries
            .iter()
            .map(|(key, e)| (*key, e.descriptor.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
