use super::observer::{RegistryObserver, SubscriptionId};
use crate::persistence::{decode_document, encode_document, MemoryBlobStore, SettingsBlobStore};
use crate::tree::{SettingsDocument, TreeStore};

use anyhow::Context;
use rdpdeck_core::{
    ConnectionIntent, ConnectionStateChanged, Node, NodeKind, RegistryEvent, Result,
    SessionSettings, TreeError, TreeId,
};
use std::cell::{Cell, RefCell, RefMut};
use std::collections::VecDeque;
use std::rc::Rc;

/// Resets the dispatching flag even if an observer panics.
struct DispatchGuard<'a> {
    flag: &'a Cell<bool>,
    pending: &'a RefCell<VecDeque<RegistryEvent>>,
}

impl<'a> DispatchGuard<'a> {
    fn enter(flag: &'a Cell<bool>, pending: &'a RefCell<VecDeque<RegistryEvent>>) -> Self {
        flag.set(true);
        Self { flag, pending }
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
        // An observer panicked: the rest of this dispatch is abandoned
        if std::thread::panicking() {
            if let Ok(mut pending) = self.pending.try_borrow_mut() {
                if !pending.is_empty() {
                    log::warn!("Dropping {} undelivered registry events", pending.len());
                    pending.clear();
                }
            }
        }
    }
}

/// Sole mutation entry point for the connection tree.
///
/// Every successful mutation is committed to the store before observers are
/// notified. Dispatch is synchronous and follows registration order; events
/// published while a dispatch is running are queued and delivered afterwards
/// in FIFO order.
pub struct SettingsRegistry {
    store: RefCell<TreeStore>,
    blob_store: Box<dyn SettingsBlobStore>,
    observers: RefCell<Vec<(SubscriptionId, Rc<dyn RegistryObserver>)>>,
    next_subscription: Cell<u64>,
    pending: RefCell<VecDeque<RegistryEvent>>,
    dispatching: Cell<bool>,
}

impl SettingsRegistry {
    fn with_store(store: TreeStore, blob_store: Box<dyn SettingsBlobStore>) -> Self {
        Self {
            store: RefCell::new(store),
            blob_store,
            observers: RefCell::new(Vec::new()),
            next_subscription: Cell::new(1),
            pending: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
        }
    }

    /// Load the tree from `blob_store`. No stored blob means an empty tree.
    pub fn open(blob_store: Box<dyn SettingsBlobStore>) -> anyhow::Result<Self> {
        let store = match blob_store.load().context("Failed to load connection tree")? {
            Some(blob) => TreeStore::from_document(decode_document(&blob)?),
            None => TreeStore::new(),
        };
        log::debug!("Connection tree opened with {} nodes", store.len());
        Ok(Self::with_store(store, blob_store))
    }

    /// Empty registry backed by memory only.
    pub fn in_memory() -> Self {
        Self::with_store(TreeStore::new(), Box::new(MemoryBlobStore::new()))
    }

    /// Encode the current tables and hand them to the blob store.
    pub fn save(&self) -> anyhow::Result<()> {
        let blob = encode_document(&self.snapshot())?;
        self.blob_store.save(&blob).context("Failed to save connection tree")
    }

    /// Owned copy of all tables, safe to send to a worker thread.
    pub fn snapshot(&self) -> SettingsDocument {
        self.store.borrow().to_document()
    }

    // === Queries ===

    pub fn get_node(&self, id: TreeId) -> Option<Node> {
        self.store.borrow().get_node(id).cloned()
    }

    pub fn get_children(&self, parent_id: Option<TreeId>) -> Vec<Node> {
        self.store
            .borrow()
            .get_children(parent_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn get_session_settings(&self, tree_id: TreeId) -> Option<SessionSettings> {
        self.store.borrow().get_session_settings(tree_id).cloned()
    }

    pub fn server_list(&self) -> Vec<String> {
        self.store.borrow().server_list()
    }

    pub fn node_count(&self) -> usize {
        self.store.borrow().len()
    }

    // === Mutations ===

    fn store_mut(&self) -> Result<RefMut<'_, TreeStore>> {
        if self.dispatching.get() {
            return Err(TreeError::invalid(
                "the connection tree cannot be modified from a notification callback",
            ));
        }
        Ok(self.store.borrow_mut())
    }

    pub fn add_node(&self, parent_id: Option<TreeId>, kind: NodeKind, name: &str) -> Result<Node> {
        let node = self.store_mut()?.add_node(parent_id, kind, name)?;
        log::debug!("Created {} {} '{}'", kind.display_name(), node.id, node.name);
        self.publish(RegistryEvent::NodeChanged(node.clone()));
        Ok(node)
    }

    /// Create a client node together with its settings. Emits one `NodeChanged`.
    pub fn add_client(
        &self,
        parent_id: Option<TreeId>,
        name: &str,
        settings: SessionSettings,
    ) -> Result<Node> {
        let node = {
            let mut store = self.store_mut()?;
            let node = store.add_node(parent_id, NodeKind::Client, name)?;
            store.put_session_settings(node.id, settings)?;
            node
        };
        log::debug!("Created client {} '{}'", node.id, node.name);
        self.publish(RegistryEvent::NodeChanged(node.clone()));
        Ok(node)
    }

    pub fn rename_node(&self, id: TreeId, name: &str) -> Result<bool> {
        let changed = {
            let mut store = self.store_mut()?;
            store
                .rename_node(id, name)?
                .then(|| store.get_node(id).cloned())
                .flatten()
        };
        Ok(match changed {
            Some(node) => {
                self.publish(RegistryEvent::NodeChanged(node));
                true
            }
            None => false,
        })
    }

    pub fn move_node(&self, id: TreeId, new_parent_id: Option<TreeId>) -> Result<bool> {
        let moved = {
            let mut store = self.store_mut()?;
            store
                .move_node(id, new_parent_id)?
                .then(|| store.get_node(id).cloned())
                .flatten()
        };
        Ok(match moved {
            Some(node) => {
                self.publish(RegistryEvent::NodeChanged(node));
                true
            }
            None => false,
        })
    }

    /// Delete a node and its subtree. Emits `NodeRemoved` for every deleted
    /// node, children first, and returns the deleted ids in that order.
    pub fn delete_node(&self, id: TreeId) -> Result<Vec<TreeId>> {
        let removed = self.store_mut()?.delete_node(id)?;
        log::debug!("Deleted node {} ({} nodes removed)", id, removed.len());
        self.publish_all(removed.iter().copied().map(RegistryEvent::NodeRemoved));
        Ok(removed)
    }

    /// Replace a client's settings wholesale.
    pub fn put_session_settings(&self, tree_id: TreeId, settings: SessionSettings) -> Result<()> {
        let node = {
            let mut store = self.store_mut()?;
            store.put_session_settings(tree_id, settings)?;
            store.get_node(tree_id).cloned()
        };
        if let Some(node) = node {
            self.publish(RegistryEvent::NodeChanged(node));
        }
        Ok(())
    }

    // === Connection state ===

    /// Broadcast a connection intent (or fact). Never changes state itself.
    pub fn request_state(&self, tree_id: TreeId, intent: ConnectionIntent) {
        self.publish(RegistryEvent::ConnectionStateChanged(ConnectionStateChanged {
            tree_id,
            intent,
        }));
    }

    // === Subscriptions ===

    pub fn subscribe(&self, observer: Rc<dyn RegistryObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.get());
        self.next_subscription.set(id.0 + 1);
        self.observers.borrow_mut().push((id, observer));
        id
    }

    /// Returns `false` if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.borrow_mut();
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.borrow().len()
    }

    fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.observers.borrow().iter().any(|(sid, _)| *sid == id)
    }

    // === Dispatch ===

    fn publish(&self, event: RegistryEvent) {
        self.publish_all(std::iter::once(event));
    }

    fn publish_all(&self, events: impl IntoIterator<Item = RegistryEvent>) {
        self.pending.borrow_mut().extend(events);
        if self.dispatching.get() {
            // Delivered by the dispatch loop already running further up the stack
            return;
        }

        let _guard = DispatchGuard::enter(&self.dispatching, &self.pending);
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(event) = next else { break };

            let observers: Vec<(SubscriptionId, Rc<dyn RegistryObserver>)> =
                self.observers.borrow().clone();
            for (id, observer) in observers {
                // Skip observers removed by an earlier callback for this event
                if self.is_subscribed(id) {
                    observer.notify(&event);
                }
            }
        }
    }
}
