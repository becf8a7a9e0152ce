use crate::types::{Node, TreeId};
use serde::{Deserialize, Serialize};

/// Requested transition for a session, broadcast without any guarantee that
/// a session for the id exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionIntent {
    Connect,
    Disconnect,
    Focus,
}

/// Payload of the `ConnectionStateChanged` notification.
///
/// The same shape carries both intents (a binding asking for a transition)
/// and facts (a controller announcing the transition it just made).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionStateChanged {
    pub tree_id: TreeId,
    pub intent: ConnectionIntent,
}

/// Connection state of one open session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Initial and terminal state
    #[default]
    Disconnected,
    /// Connect issued, waiting for the remote session to report success
    Connecting,
    /// Remote session reported success
    Connected,
}

impl ConnectionStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Connected",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

/// Everything the settings registry fans out to its observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A node was created, renamed or moved, or its settings were replaced.
    NodeChanged(Node),
    /// A node was deleted. Emitted once per deleted node, children first.
    NodeRemoved(TreeId),
    ConnectionStateChanged(ConnectionStateChanged),
}

impl RegistryEvent {
    /// Tree id this event refers to.
    pub fn tree_id(&self) -> TreeId {
        match self {
            RegistryEvent::NodeChanged(node) => node.id,
            RegistryEvent::NodeRemoved(id) => *id,
            RegistryEvent::ConnectionStateChanged(change) => change.tree_id,
        }
    }
}
