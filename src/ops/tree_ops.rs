use std::collections::HashSet;

use crate::model::{Database, FileContent, Node, NodeId, NodeType, safe_name};
use crate::ops::favorites;

/// Error type for tree operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("node not found: {0}")]
    NotFound(String),
    #[error("not a folder: {0}")]
    NotAFolder(String),
    #[error("not a file: {0}")]
    NotAFile(String),
    #[error("the {0} root cannot be renamed, moved or deleted")]
    RootProtected(String),
    #[error("cannot move {0} into itself or one of its descendants")]
    WouldCycle(String),
    #[error("shortcut {0} points at a file that no longer exists")]
    MissingTarget(String),
}

/// What `delete_subtree` removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteResult {
    /// Folder that held the deleted node, if it had one
    pub parent_id: Option<NodeId>,
    /// Every removed ID: the subtree post-order, then any favorites of its files
    pub removed: Vec<NodeId>,
}

impl DeleteResult {
    pub fn contains(&self, id: &str) -> bool {
        self.removed.iter().any(|r| r == id)
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// The folder whose children contain `node_id`. Linear scan; there are no
/// parent pointers.
pub fn find_parent<'a>(db: &'a Database, node_id: &str) -> Option<&'a Node> {
    db.nodes
        .values()
        .find(|n| n.children().iter().any(|c| c == node_id))
}

fn require_folder<'a>(db: &'a Database, id: &str) -> Result<&'a Node, TreeError> {
    let node = db.get(id).ok_or_else(|| TreeError::NotFound(id.to_string()))?;
    if !node.is_folder() {
        return Err(TreeError::NotAFolder(id.to_string()));
    }
    Ok(node)
}

fn root_label(db: &Database, id: &str) -> String {
    db.get(id).map_or_else(|| id.to_string(), |n| n.name.clone())
}

/// IDs of `root_id` and everything under it, pre-order. Only folders are
/// descended into. IDs missing from the mapping are skipped and each node
/// is visited once even if the graph has a cycle.
pub fn subtree_ids(db: &Database, root_id: &str) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![root_id.to_string()];
    while let Some(id) = stack.pop() {
        let Some(node) = db.get(&id) else {
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }
        stack.extend(node.children().iter().rev().cloned());
        out.push(id);
    }
    out
}

/// True if `candidate` is `ancestor` or somewhere beneath it.
pub fn is_within(db: &Database, ancestor: &str, candidate: &str) -> bool {
    subtree_ids(db, ancestor).iter().any(|id| id == candidate)
}

/// Display order: folders first, then case-insensitive name.
pub fn sorted_children<'a>(db: &'a Database, folder_id: &str) -> Result<Vec<&'a Node>, TreeError> {
    let folder = require_folder(db, folder_id)?;
    let mut children: Vec<&Node> = folder
        .children()
        .iter()
        .filter_map(|id| db.get(id))
        .collect();
    children.sort_by(|a, b| {
        b.is_folder()
            .cmp(&a.is_folder())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    Ok(children)
}

/// Names from the owning root down to `node_id`, inclusive.
pub fn path_names(db: &Database, node_id: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut current = db.get(node_id);
    while let Some(node) = current {
        names.push(node.name.clone());
        if names.len() > db.nodes.len() {
            break;
        }
        current = find_parent(db, &node.id);
    }
    names.reverse();
    names
}

/// The file a node stands for: itself, or a shortcut's live target.
pub fn resolve_file<'a>(db: &'a Database, node_id: &str) -> Result<&'a Node, TreeError> {
    let node = db
        .get(node_id)
        .ok_or_else(|| TreeError::NotFound(node_id.to_string()))?;
    match node.node_type() {
        NodeType::File => Ok(node),
        NodeType::Shortcut => node
            .target_id()
            .and_then(|t| db.get(t))
            .filter(|t| t.is_file())
            .ok_or_else(|| TreeError::MissingTarget(node_id.to_string())),
        NodeType::Folder => Err(TreeError::NotAFile(node_id.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Create an empty folder at the end of `parent_id`'s children.
pub fn create_folder(db: &mut Database, parent_id: &str, name: &str) -> Result<NodeId, TreeError> {
    require_folder(db, parent_id)?;
    let node = Node::folder(db.fresh_id(), safe_name(name));
    Ok(db.attach(parent_id, node))
}

/// Create a file with a blank read document and one blank snippet.
pub fn create_file(db: &mut Database, parent_id: &str, name: &str) -> Result<NodeId, TreeError> {
    require_folder(db, parent_id)?;
    let node = Node::file(db.fresh_id(), safe_name(name), FileContent::new());
    Ok(db.attach(parent_id, node))
}

/// Rename a node. Renaming a shortcut renames the file it points at; file
/// renames are mirrored onto their favorites. Returns the ID actually renamed.
pub fn rename(db: &mut Database, node_id: &str, new_name: &str) -> Result<NodeId, TreeError> {
    if db.is_root(node_id) {
        return Err(TreeError::RootProtected(root_label(db, node_id)));
    }
    let node = db
        .get(node_id)
        .ok_or_else(|| TreeError::NotFound(node_id.to_string()))?;

    let renamed_id = match node.target_id() {
        Some(target) if db.get(target).is_some_and(Node::is_file) => target.to_string(),
        _ => node_id.to_string(),
    };

    let name = safe_name(new_name);
    if let Some(node) = db.get_mut(&renamed_id) {
        node.name = name;
    }
    favorites::sync_names(db, &renamed_id);
    Ok(renamed_id)
}

/// Delete a node and everything beneath it, plus the favorites of every
/// deleted file.
pub fn delete_subtree(db: &mut Database, node_id: &str) -> Result<DeleteResult, TreeError> {
    if db.is_root(node_id) {
        return Err(TreeError::RootProtected(root_label(db, node_id)));
    }
    if !db.contains(node_id) {
        return Err(TreeError::NotFound(node_id.to_string()));
    }

    let parent_id = find_parent(db, node_id).map(|p| p.id.clone());

    let mut removed: Vec<NodeId> = subtree_ids(db, node_id)
        .into_iter()
        .filter(|id| !db.is_root(id))
        .collect();
    removed.reverse();

    let files: Vec<NodeId> = removed
        .iter()
        .filter(|id| db.get(id).is_some_and(Node::is_file))
        .cloned()
        .collect();

    for id in &removed {
        db.nodes.shift_remove(id);
    }
    for file_id in &files {
        let shortcuts: Vec<NodeId> = db
            .favorites()
            .filter(|n| n.targets(file_id))
            .map(|n| n.id.clone())
            .collect();
        favorites::remove_favorite(db, file_id);
        removed.extend(shortcuts);
    }

    for node in db.nodes.values_mut() {
        if let Some(children) = node.children_mut() {
            children.retain(|c| !removed.contains(c));
        }
    }

    tracing::info!(node_id, count = removed.len(), "deleted subtree");
    Ok(DeleteResult { parent_id, removed })
}

/// Move a node to the end of another folder's children.
pub fn move_node(db: &mut Database, node_id: &str, new_parent_id: &str) -> Result<(), TreeError> {
    if db.is_root(node_id) {
        return Err(TreeError::RootProtected(root_label(db, node_id)));
    }
    if !db.contains(node_id) {
        return Err(TreeError::NotFound(node_id.to_string()));
    }
    require_folder(db, new_parent_id)?;
    if is_within(db, node_id, new_parent_id) {
        return Err(TreeError::WouldCycle(node_id.to_string()));
    }

    for node in db.nodes.values_mut() {
        if let Some(children) = node.children_mut() {
            children.retain(|c| c != node_id);
        }
    }
    if let Some(children) = db.get_mut(new_parent_id).and_then(Node::children_mut) {
        children.push(node_id.to_string());
    }
    Ok(())
}
