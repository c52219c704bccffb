use std::fmt;

use super::content::FileContent;

/// Node identifier. New nodes get UUID v4 text; IDs read from disk are kept
/// verbatim.
pub type NodeId = String;

/// Generate a fresh node ID.
pub fn new_id() -> NodeId {
    uuid::Uuid::new_v4().to_string()
}

/// Fallback display name for blank names.
pub const PLACEHOLDER_NAME: &str = "Untitled";

/// Normalize a user-supplied name: trimmed, blank becomes the placeholder.
pub fn safe_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// The discriminant persisted as a node's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Folder,
    File,
    Shortcut,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Folder => "folder",
            NodeType::File => "file",
            NodeType::Shortcut => "shortcut",
        }
    }

    /// Parse a persisted `type`. Unknown values are `None`.
    pub fn parse(s: &str) -> Option<NodeType> {
        match s {
            "folder" => Some(NodeType::Folder),
            "file" => Some(NodeType::File),
            "shortcut" => Some(NodeType::Shortcut),
            _ => None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Owns its children, in order.
    Folder { children: Vec<NodeId> },
    File { content: FileContent },
    /// Weak reference to a file node; may dangle.
    Shortcut { target_id: Option<NodeId> },
}

/// A folder, file or shortcut in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
}

impl Node {
    pub fn folder(id: NodeId, name: impl Into<String>) -> Self {
        Node {
            id,
            name: name.into(),
            kind: NodeKind::Folder {
                children: Vec::new(),
            },
        }
    }

    pub fn file(id: NodeId, name: impl Into<String>, content: FileContent) -> Self {
        Node {
            id,
            name: name.into(),
            kind: NodeKind::File { content },
        }
    }

    pub fn shortcut(id: NodeId, name: impl Into<String>, target_id: NodeId) -> Self {
        Node {
            id,
            name: name.into(),
            kind: NodeKind::Shortcut {
                target_id: Some(target_id),
            },
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Folder { .. } => NodeType::Folder,
            NodeKind::File { .. } => NodeType::File,
            NodeKind::Shortcut { .. } => NodeType::Shortcut,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, NodeKind::Folder { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, NodeKind::File { .. })
    }

    /// Children of a folder; empty for other variants.
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Folder { children } => children,
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match &mut self.kind {
            NodeKind::Folder { children } => Some(children),
            _ => None,
        }
    }

    pub fn content(&self) -> Option<&FileContent> {
        match &self.kind {
            NodeKind::File { content } => Some(content),
            _ => None,
        }
    }

    pub fn content_mut(&mut self) -> Option<&mut FileContent> {
        match &mut self.kind {
            NodeKind::File { content } => Some(content),
            _ => None,
        }
    }

    pub fn target_id(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Shortcut { target_id } => target_id.as_deref(),
            _ => None,
        }
    }

    /// True if this is a shortcut pointing at `file_id`.
    pub fn targets(&self, file_id: &str) -> bool {
        self.target_id() == Some(file_id)
    }
}
