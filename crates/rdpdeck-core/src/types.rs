use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a node in the connection tree.
///
/// Ids are assigned by the tree store on creation and never reused while
/// the node exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TreeId(pub u32);

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Container for other nodes.
    Folder,
    /// Leaf bound to exactly one `SessionSettings` record.
    Client,
}

impl NodeKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            NodeKind::Folder => "Folder",
            NodeKind::Client => "Client",
        }
    }
}

/// An entry in the connection tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: TreeId,
    /// `None` means the node sits at the root.
    #[serde(default)]
    pub parent_id: Option<TreeId>,
    pub kind: NodeKind,
    pub name: String,
    /// Sibling ordering, ascending.
    #[serde(default)]
    pub order_key: u32,
}

impl Node {
    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn is_client(&self) -> bool {
        self.kind == NodeKind::Client
    }
}
