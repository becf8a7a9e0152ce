use super::client_form::ClientForm;
use super::host::HostWindows;
use crate::registry::{EventQueue, SettingsRegistry, SubscriptionId};
use crate::session::SessionDirectory;
use crate::tree::SettingsDocument;

use async_channel::{Receiver, TryRecvError};
use rdpdeck_core::{
    ClientIcon, ConnectionIntent, ConnectionStatus, Node, NodeKind, RegistryEvent, Result,
    SessionSettings, TreeError, TreeId,
};
use std::collections::HashMap;
use std::rc::Rc;

/// Icon shown next to a tree row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowIcon {
    Folder,
    Client { icon: ClientIcon, connected: bool },
}

/// One displayed row of the connection tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeRow {
    pub id: TreeId,
    pub parent_id: Option<TreeId>,
    pub name: String,
    pub kind: NodeKind,
    pub order_key: u32,
    pub icon: RowIcon,
}

impl TreeRow {
    fn from_node(node: &Node, icon: RowIcon) -> Self {
        Self {
            id: node.id,
            parent_id: node.parent_id,
            name: node.name.clone(),
            kind: node.kind,
            order_key: node.order_key,
            icon,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.icon, RowIcon::Client { connected: true, .. })
    }
}

fn row_icon(kind: NodeKind, icon: ClientIcon, status: Option<ConnectionStatus>) -> RowIcon {
    match kind {
        NodeKind::Folder => RowIcon::Folder,
        NodeKind::Client => RowIcon::Client {
            icon,
            connected: status.is_some_and(|s| s.is_connected()),
        },
    }
}

/// Build the initial rows, depth first. Runs on the enumeration worker.
fn build_listing(
    document: SettingsDocument,
    statuses: HashMap<TreeId, ConnectionStatus>,
) -> Vec<TreeRow> {
    let icons: HashMap<TreeId, ClientIcon> = document
        .clients
        .iter()
        .map(|c| (c.tree_id, c.settings.icon))
        .collect();
    let mut by_parent: HashMap<Option<TreeId>, Vec<&Node>> = HashMap::new();
    for node in &document.nodes {
        by_parent.entry(node.parent_id).or_default().push(node);
    }
    for children in by_parent.values_mut() {
        children.sort_by_key(|n| (n.order_key, n.id));
    }

    let mut rows = Vec::with_capacity(document.nodes.len());
    let mut stack: Vec<&Node> = by_parent.get(&None).into_iter().flatten().rev().copied().collect();
    while let Some(node) = stack.pop() {
        let icon = row_icon(
            node.kind,
            icons.get(&node.id).copied().unwrap_or_default(),
            statuses.get(&node.id).copied(),
        );
        rows.push(TreeRow::from_node(node, icon));
        if let Some(children) = by_parent.get(&Some(node.id)) {
            stack.extend(children.iter().rev().copied());
        }
    }
    rows
}

/// Navigation panel binding: mirrors the tree with per-client connection
/// icons and turns user commands into registry calls and intents.
///
/// Registry notifications are queued and applied by `process_events` on the
/// panel's own loop, only once the initial listing has arrived.
pub struct TreePanel {
    registry: Rc<SettingsRegistry>,
    directory: SessionDirectory,
    events: EventQueue,
    subscription: Option<SubscriptionId>,
    rows: HashMap<TreeId, TreeRow>,
    listing: Option<Receiver<Vec<TreeRow>>>,
}

impl TreePanel {
    /// Subscribe and start building the initial listing on a worker thread.
    pub fn open(registry: Rc<SettingsRegistry>, directory: SessionDirectory) -> Self {
        let events = EventQueue::new();
        // Subscribe before taking the snapshot so nothing falls in between
        let subscription = registry.subscribe(Rc::new(events.clone()));
        let document = registry.snapshot();
        let statuses = directory.statuses();

        let (tx, rx) = async_channel::bounded(1);
        let mut panel = Self {
            registry,
            directory,
            events,
            subscription: Some(subscription),
            rows: HashMap::new(),
            listing: Some(rx),
        };

        let spawned = std::thread::Builder::new()
            .name("tree-listing".into())
            .spawn(move || {
                let rows = build_listing(document, statuses);
                if tx.send_blocking(rows).is_err() {
                    log::debug!("Tree panel closed before its listing was ready");
                }
            });
        if let Err(e) = spawned {
            log::error!("Failed to spawn tree enumeration worker: {}, listing inline", e);
            panel.load_inline();
        }
        panel
    }

    fn load_inline(&mut self) {
        let rows = build_listing(self.registry.snapshot(), self.directory.statuses());
        self.apply_listing(rows);
    }

    fn apply_listing(&mut self, rows: Vec<TreeRow>) {
        self.listing = None;
        self.rows = rows.into_iter().map(|row| (row.id, row)).collect();
        log::debug!("Tree listing loaded with {} rows", self.rows.len());
        self.process_events();
    }

    pub fn is_loaded(&self) -> bool {
        self.listing.is_none()
    }

    /// Apply the initial listing if the worker has finished. Returns whether
    /// the panel is loaded.
    pub fn poll_listing(&mut self) -> bool {
        let Some(rx) = &self.listing else {
            return true;
        };
        match rx.try_recv() {
            Ok(rows) => self.apply_listing(rows),
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Closed) => {
                log::error!("Tree enumeration worker exited without a listing, listing inline");
                self.load_inline();
            }
        }
        true
    }

    /// Block until the initial listing is applied.
    pub fn wait_listing(&mut self) {
        let Some(rx) = self.listing.clone() else {
            return;
        };
        match smol::block_on(rx.recv()) {
            Ok(rows) => self.apply_listing(rows),
            Err(_) => {
                log::error!("Tree enumeration worker exited without a listing, listing inline");
                self.load_inline();
            }
        }
    }

    /// Apply queued registry notifications. Deferred until the listing is loaded.
    pub fn process_events(&mut self) {
        if !self.is_loaded() {
            return;
        }
        for event in self.events.drain() {
            match event {
                RegistryEvent::NodeChanged(node) => {
                    let icon = self.icon_for(&node);
                    self.rows.insert(node.id, TreeRow::from_node(&node, icon));
                }
                RegistryEvent::NodeRemoved(id) => {
                    self.rows.remove(&id);
                }
                RegistryEvent::ConnectionStateChanged(change) => {
                    let connected = self
                        .directory
                        .status(change.tree_id)
                        .is_some_and(|s| s.is_connected());
                    match self.rows.get_mut(&change.tree_id) {
                        Some(row) => {
                            if let RowIcon::Client { connected: shown, .. } = &mut row.icon {
                                *shown = connected;
                            }
                        }
                        None => log::warn!(
                            "Connection state change for unknown node {}",
                            change.tree_id
                        ),
                    }
                }
            }
        }
    }

    fn icon_for(&self, node: &Node) -> RowIcon {
        let icon = self
            .registry
            .get_session_settings(node.id)
            .map(|s| s.icon)
            .unwrap_or_default();
        row_icon(node.kind, icon, self.directory.status(node.id))
    }

    // === Display ===

    pub fn row(&self, id: TreeId) -> Option<&TreeRow> {
        self.rows.get(&id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Displayed children of `parent_id`, in sibling order.
    pub fn children(&self, parent_id: Option<TreeId>) -> Vec<&TreeRow> {
        let mut children: Vec<&TreeRow> = self
            .rows
            .values()
            .filter(|row| row.parent_id == parent_id)
            .collect();
        children.sort_by_key(|row| (row.order_key, row.id));
        children
    }

    /// Case-insensitive sibling name check, ignoring `except`.
    pub fn sibling_name_taken(&self, parent_id: Option<TreeId>, name: &str, except: Option<TreeId>) -> bool {
        let name = name.trim().to_lowercase();
        self.registry
            .get_children(parent_id)
            .iter()
            .any(|n| Some(n.id) != except && n.name.to_lowercase() == name)
    }

    fn ensure_unique_name(&self, parent_id: Option<TreeId>, name: &str, except: Option<TreeId>) -> Result<()> {
        if self.sibling_name_taken(parent_id, name, except) {
            return Err(TreeError::validation(format!(
                "a node named '{}' already exists here",
                name.trim()
            )));
        }
        Ok(())
    }

    // === Commands ===

    pub fn create_folder(&self, parent_id: Option<TreeId>, name: &str) -> Result<Node> {
        self.ensure_unique_name(parent_id, name, None)?;
        self.registry.add_node(parent_id, NodeKind::Folder, name)
    }

    pub fn create_client(
        &self,
        parent_id: Option<TreeId>,
        name: &str,
        form: &ClientForm,
    ) -> Result<Node> {
        let settings = form.to_settings()?;
        self.ensure_unique_name(parent_id, name, None)?;
        self.registry.add_client(parent_id, name, settings)
    }

    pub fn rename(&self, id: TreeId, name: &str) -> Result<bool> {
        let node = self.registry.get_node(id).ok_or(TreeError::NotFound(id))?;
        self.ensure_unique_name(node.parent_id, name, Some(id))?;
        self.registry.rename_node(id, name)
    }

    pub fn delete(&self, id: TreeId) -> Result<Vec<TreeId>> {
        self.registry.delete_node(id)
    }

    pub fn move_node(&self, id: TreeId, new_parent_id: Option<TreeId>) -> Result<bool> {
        self.registry.move_node(id, new_parent_id)
    }

    /// Settings of a client as an editor form.
    pub fn edit_form(&self, id: TreeId) -> Option<ClientForm> {
        self.registry
            .get_session_settings(id)
            .map(|settings| ClientForm::from_settings(&settings))
    }

    pub fn save_form(&self, id: TreeId, form: &ClientForm) -> Result<()> {
        let settings: SessionSettings = form.to_settings()?;
        self.registry.put_session_settings(id, settings)
    }

    /// Double-click on a row: focus a connected session, reconnect an open
    /// one, or ask the host for a new session window.
    pub fn activate(&self, id: TreeId, host: &mut dyn HostWindows) -> Result<()> {
        let node = self.registry.get_node(id).ok_or(TreeError::NotFound(id))?;
        if node.is_folder() {
            return Err(TreeError::invalid(format!("folder {} cannot be opened", id)));
        }
        match self.directory.status(id) {
            Some(ConnectionStatus::Connected) => {
                self.registry.request_state(id, ConnectionIntent::Focus)
            }
            Some(_) => self.registry.request_state(id, ConnectionIntent::Connect),
            None => host.open_session_window(id),
        }
        Ok(())
    }

    pub fn disconnect(&self, id: TreeId) -> Result<()> {
        let node = self.registry.get_node(id).ok_or(TreeError::NotFound(id))?;
        if !node.is_client() {
            return Err(TreeError::invalid(format!("folder {} has no session", id)));
        }
        self.registry.request_state(id, ConnectionIntent::Disconnect);
        Ok(())
    }
}

impl Drop for TreePanel {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.registry.unsubscribe(subscription);
        }
    }
}
