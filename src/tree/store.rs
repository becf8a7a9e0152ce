use rdpdeck_core::{Node, NodeKind, Result, SessionSettings, TreeError, TreeId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Current settings document schema version - increment when making breaking changes
pub const SETTINGS_DOCUMENT_VERSION: u32 = 1;

/// Session settings row keyed by its owning client node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub tree_id: TreeId,
    pub settings: SessionSettings,
}

/// Serializable form of the whole store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsDocument {
    /// Schema version for migration support
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub clients: Vec<ClientRecord>,
}

/// In-memory table of record for nodes and their session settings.
///
/// Nodes reference their parent by id only, so the structure can never hold
/// pointer cycles; parent cycles are rejected by `move_node`.
#[derive(Debug)]
pub struct TreeStore {
    nodes: HashMap<TreeId, Node>,
    sessions: HashMap<TreeId, SessionSettings>,
    /// `None` once every id up to `u32::MAX` has been handed out
    next_id: Option<u32>,
}

fn normalize_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TreeError::validation("name must not be empty"));
    }
    Ok(trimmed.to_string())
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStore {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            sessions: HashMap::new(),
            next_id: Some(1),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get_node(&self, id: TreeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Direct children of `parent_id` (root when `None`), ordered by `order_key`.
    pub fn get_children(&self, parent_id: Option<TreeId>) -> Vec<&Node> {
        let mut children: Vec<&Node> = self
            .nodes
            .values()
            .filter(|n| n.parent_id == parent_id)
            .collect();
        children.sort_by_key(|n| (n.order_key, n.id));
        children
    }

    /// Whether `id` lies in the subtree rooted at `ancestor` (the root itself included).
    pub fn is_in_subtree(&self, id: TreeId, ancestor: TreeId) -> bool {
        let mut current = Some(id);
        let mut seen = HashSet::new();
        while let Some(cur) = current {
            if cur == ancestor {
                return true;
            }
            if !seen.insert(cur) {
                return false;
            }
            current = self.nodes.get(&cur).and_then(|n| n.parent_id);
        }
        false
    }

    /// Number of nodes in the subtree rooted at `id`, including `id`.
    pub fn subtree_size(&self, id: TreeId) -> usize {
        if !self.nodes.contains_key(&id) {
            return 0;
        }
        1 + self
            .get_children(Some(id))
            .iter()
            .map(|child| self.subtree_size(child.id))
            .sum::<usize>()
    }

    fn next_order_key(&self, parent_id: Option<TreeId>) -> u32 {
        self.nodes
            .values()
            .filter(|n| n.parent_id == parent_id)
            .map(|n| n.order_key.saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    /// Resolve a prospective parent: it must exist and be a folder.
    fn check_parent(&self, parent_id: Option<TreeId>) -> Result<()> {
        if let Some(pid) = parent_id {
            let parent = self.nodes.get(&pid).ok_or(TreeError::NotFound(pid))?;
            if parent.is_client() {
                return Err(TreeError::invalid(format!(
                    "client node {} cannot have children",
                    pid
                )));
            }
        }
        Ok(())
    }

    /// Create a node under `parent_id`. Client nodes start with default settings.
    pub fn add_node(&mut self, parent_id: Option<TreeId>, kind: NodeKind, name: &str) -> Result<Node> {
        let name = normalize_name(name)?;
        self.check_parent(parent_id)?;

        let id = self
            .next_id
            .map(TreeId)
            .ok_or_else(|| TreeError::invalid("no node ids left"))?;
        self.next_id = id.0.checked_add(1);
        let node = Node {
            id,
            parent_id,
            kind,
            name,
            order_key: self.next_order_key(parent_id),
        };
        self.nodes.insert(id, node.clone());
        if kind == NodeKind::Client {
            self.sessions.insert(id, SessionSettings::default());
        }
        Ok(node)
    }

    /// Rename a node. Returns `false` when the trimmed name is unchanged.
    pub fn rename_node(&mut self, id: TreeId, name: &str) -> Result<bool> {
        let name = normalize_name(name)?;
        let node = self.nodes.get_mut(&id).ok_or(TreeError::NotFound(id))?;
        if node.name == name {
            return Ok(false);
        }
        node.name = name;
        Ok(true)
    }

    /// Reparent a node. Returns `false` when it already sits under `new_parent_id`.
    pub fn move_node(&mut self, id: TreeId, new_parent_id: Option<TreeId>) -> Result<bool> {
        let current_parent = self
            .nodes
            .get(&id)
            .ok_or(TreeError::NotFound(id))?
            .parent_id;
        self.check_parent(new_parent_id)?;
        if let Some(pid) = new_parent_id {
            if self.is_in_subtree(pid, id) {
                return Err(TreeError::invalid(format!(
                    "cannot move node {} into itself or its descendant {}",
                    id, pid
                )));
            }
        }
        if current_parent == new_parent_id {
            return Ok(false);
        }

        let order_key = self.next_order_key(new_parent_id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent_id = new_parent_id;
            node.order_key = order_key;
        }
        Ok(true)
    }

    /// Delete a node and, for folders, its whole subtree.
    ///
    /// Returns the deleted ids in deletion order (descendants before ancestors).
    pub fn delete_node(&mut self, id: TreeId) -> Result<Vec<TreeId>> {
        if !self.nodes.contains_key(&id) {
            return Err(TreeError::NotFound(id));
        }
        let mut removed = Vec::new();
        self.delete_recursive(id, &mut removed);
        Ok(removed)
    }

    fn delete_recursive(&mut self, id: TreeId, removed: &mut Vec<TreeId>) {
        let children: Vec<TreeId> = self.get_children(Some(id)).iter().map(|n| n.id).collect();
        for child in children {
            self.delete_recursive(child, removed);
        }
        self.sessions.remove(&id);
        self.nodes.remove(&id);
        removed.push(id);
    }

    pub fn get_session_settings(&self, tree_id: TreeId) -> Option<&SessionSettings> {
        self.sessions.get(&tree_id)
    }

    /// Replace the settings of a client node wholesale.
    pub fn put_session_settings(&mut self, tree_id: TreeId, settings: SessionSettings) -> Result<()> {
        let node = self.nodes.get(&tree_id).ok_or(TreeError::NotFound(tree_id))?;
        if !node.is_client() {
            return Err(TreeError::invalid(format!(
                "node {} is a folder and has no session settings",
                tree_id
            )));
        }
        self.sessions.insert(tree_id, settings);
        Ok(())
    }

    /// Distinct non-empty hosts across all clients, sorted.
    pub fn server_list(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self
            .sessions
            .values()
            .map(|s| s.host.trim())
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        hosts.sort();
        hosts
    }

    /// Owned copy of every table, ordered by id.
    pub fn to_document(&self) -> SettingsDocument {
        let mut nodes: Vec<Node> = self.nodes.values().cloned().collect();
        nodes.sort_by_key(|n| n.id);
        let mut clients: Vec<ClientRecord> = self
            .sessions
            .iter()
            .map(|(id, settings)| ClientRecord {
                tree_id: *id,
                settings: settings.clone(),
            })
            .collect();
        clients.sort_by_key(|c| c.tree_id);
        SettingsDocument {
            version: SETTINGS_DOCUMENT_VERSION,
            nodes,
            clients,
        }
    }

    /// Build a store from a persisted document, repairing anything that would
    /// break the tree invariants.
    pub fn from_document(document: SettingsDocument) -> Self {
        let mut nodes: HashMap<TreeId, Node> = HashMap::new();
        for mut node in document.nodes {
            if nodes.contains_key(&node.id) {
                log::warn!("Dropping duplicate node id {} ('{}')", node.id, node.name);
                continue;
            }
            let trimmed = node.name.trim();
            if trimmed.is_empty() {
                log::warn!("Node {} has an empty name, renaming", node.id);
                node.name = format!("Node {}", node.id);
            } else if trimmed.len() != node.name.len() {
                node.name = trimmed.to_string();
            }
            nodes.insert(node.id, node);
        }

        // Parents must exist and be folders
        let invalid_parent: Vec<TreeId> = nodes
            .values()
            .filter(|n| match n.parent_id {
                Some(pid) => !nodes.get(&pid).is_some_and(|p| p.is_folder()),
                None => false,
            })
            .map(|n| n.id)
            .collect();
        for id in invalid_parent {
            log::warn!("Node {} has a missing or non-folder parent, moving to root", id);
            if let Some(node) = nodes.get_mut(&id) {
                node.parent_id = None;
            }
        }

        // Break parent cycles
        let mut ids: Vec<TreeId> = nodes.keys().copied().collect();
        ids.sort();
        for id in ids {
            let mut seen = HashSet::new();
            let mut current = Some(id);
            while let Some(cur) = current {
                if !seen.insert(cur) {
                    log::warn!("Node {} is part of a parent cycle, moving to root", cur);
                    if let Some(node) = nodes.get_mut(&cur) {
                        node.parent_id = None;
                    }
                    break;
                }
                current = nodes.get(&cur).and_then(|n| n.parent_id);
            }
        }

        let mut sessions = HashMap::new();
        for record in document.clients {
            match nodes.get(&record.tree_id) {
                Some(node) if node.is_client() => {
                    sessions.insert(record.tree_id, record.settings);
                }
                _ => log::warn!(
                    "Dropping session settings for {} (no such client node)",
                    record.tree_id
                ),
            }
        }
        for node in nodes.values().filter(|n| n.is_client()) {
            if !sessions.contains_key(&node.id) {
                log::warn!("Client {} has no session settings, using defaults", node.id);
                sessions.insert(node.id, SessionSettings::default());
            }
        }

        let next_id = match nodes.keys().map(|id| id.0).max() {
            None => Some(1),
            Some(max) => {
                let next = max.checked_add(1);
                if next.is_none() {
                    log::warn!("Node id {} is the largest possible id, new nodes cannot be added", max);
                }
                next
            }
        };
        Self {
            nodes,
            sessions,
            next_id,
        }
    }
}
