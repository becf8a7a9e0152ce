use rdpdeck_core::{ConnectionStatus, TreeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Runtime state of one open session window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionRuntimeState {
    pub tree_id: TreeId,
    pub status: ConnectionStatus,
}

/// Table of open sessions keyed by tree id. Cloning shares the table.
///
/// Answers "is a window open for this id" and "is it connected" without
/// scanning the open windows.
#[derive(Clone, Default)]
pub struct SessionDirectory {
    sessions: Rc<RefCell<HashMap<TreeId, SessionRuntimeState>>>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if a session for `tree_id` is already registered.
    pub(crate) fn register(&self, tree_id: TreeId) -> bool {
        let mut sessions = self.sessions.borrow_mut();
        if sessions.contains_key(&tree_id) {
            return false;
        }
        sessions.insert(
            tree_id,
            SessionRuntimeState {
                tree_id,
                status: ConnectionStatus::Disconnected,
            },
        );
        true
    }

    pub(crate) fn set_status(&self, tree_id: TreeId, status: ConnectionStatus) {
        if let Some(state) = self.sessions.borrow_mut().get_mut(&tree_id) {
            state.status = status;
        }
    }

    pub(crate) fn remove(&self, tree_id: TreeId) {
        self.sessions.borrow_mut().remove(&tree_id);
    }

    pub fn contains(&self, tree_id: TreeId) -> bool {
        self.sessions.borrow().contains_key(&tree_id)
    }

    /// `None` when no session window is open for `tree_id`.
    pub fn status(&self, tree_id: TreeId) -> Option<ConnectionStatus> {
        self.sessions.borrow().get(&tree_id).map(|s| s.status)
    }

    pub fn statuses(&self) -> HashMap<TreeId, ConnectionStatus> {
        self.sessions
            .borrow()
            .iter()
            .map(|(id, state)| (*id, state.status))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.borrow().is_empty()
    }
}
