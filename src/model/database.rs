use indexmap::IndexMap;

use super::node::{new_id, Node, NodeId};

pub const QUICKCOPY_NAME: &str = "QuickCopy";
pub const FAVORITES_NAME: &str = "Favorites";

/// The whole store: two fixed root folders and the node mapping that owns
/// every live node.
///
/// Equality compares `nodes` as a mapping; insertion order does not matter,
/// children order does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    pub quickcopy_root_id: NodeId,
    pub favorites_root_id: NodeId,
    pub nodes: IndexMap<NodeId, Node>,
}

impl Database {
    /// A store containing only the two empty roots.
    pub fn blank() -> Self {
        let favorites = Node::folder(new_id(), FAVORITES_NAME);
        let quickcopy = Node::folder(new_id(), QUICKCOPY_NAME);
        let mut nodes = IndexMap::new();
        let favorites_root_id = favorites.id.clone();
        let quickcopy_root_id = quickcopy.id.clone();
        nodes.insert(favorites.id.clone(), favorites);
        nodes.insert(quickcopy.id.clone(), quickcopy);
        Database {
            quickcopy_root_id,
            favorites_root_id,
            nodes,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn is_root(&self, id: &str) -> bool {
        id == self.quickcopy_root_id || id == self.favorites_root_id
    }

    /// The node if it is a folder.
    pub fn folder(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id).filter(|n| n.is_folder())
    }

    pub fn quickcopy_root(&self) -> Option<&Node> {
        self.folder(&self.quickcopy_root_id)
    }

    pub fn favorites_root(&self) -> Option<&Node> {
        self.folder(&self.favorites_root_id)
    }

    /// Children of the Favorites root that resolve to live nodes.
    pub fn favorites(&self) -> impl Iterator<Item = &Node> {
        self.favorites_root()
            .map(|f| f.children())
            .unwrap_or(&[])
            .iter()
            .filter_map(|id| self.nodes.get(id))
    }

    /// A new ID not present in this store.
    pub fn fresh_id(&self) -> NodeId {
        loop {
            let id = new_id();
            if !self.nodes.contains_key(&id) {
                return id;
            }
        }
    }

    /// Insert a node and append it to a folder's children. The caller has
    /// already validated `parent_id`.
    pub(crate) fn attach(&mut self, parent_id: &str, node: Node) -> NodeId {
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        if let Some(children) = self.nodes.get_mut(parent_id).and_then(Node::children_mut) {
            children.push(id.clone());
        }
        id
    }

    /// Resolve a node by exact ID or unique ID prefix.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<&Node, LookupError> {
        if let Some(node) = self.nodes.get(prefix) {
            return Ok(node);
        }
        let mut matches = self.nodes.values().filter(|n| n.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(node), None) if !prefix.is_empty() => Ok(node),
            (Some(_), Some(_)) => Err(LookupError::Ambiguous(prefix.to_string())),
            _ => Err(LookupError::NotFound(prefix.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("no node matches {0:?}")]
    NotFound(String),
    #[error("{0:?} matches more than one node; use more characters")]
    Ambiguous(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::node::NodeKind;

    #[test]
    fn blank_has_two_empty_roots() {
        let db = Database::blank();
        assert_eq!(db.nodes.len(), 2);
        assert_eq!(db.quickcopy_root().unwrap().name, "QuickCopy");
        assert_eq!(db.favorites_root().unwrap().name, "Favorites");
        assert!(db.quickcopy_root().unwrap().children().is_empty());
        assert_ne!(db.quickcopy_root_id, db.favorites_root_id);
    }

    #[test]
    fn equality_ignores_mapping_order() {
        let db = Database::blank();
        let mut reordered = db.clone();
        reordered.nodes.reverse();
        assert_eq!(db, reordered);
    }

    #[test]
    fn equality_respects_children_order() {
        let mut a = Database::blank();
        let root = a.quickcopy_root_id.clone();
        a.attach(&root, Node::folder("x".into(), "X"));
        a.attach(&root, Node::folder("y".into(), "Y"));
        let mut b = a.clone();
        if let NodeKind::Folder { children } = &mut b.get_mut(&root).unwrap().kind {
            children.reverse();
        }
        assert_ne!(a, b);
    }

    #[test]
    fn resolve_by_prefix() {
        let mut db = Database::blank();
        let root = db.quickcopy_root_id.clone();
        db.attach(&root, Node::folder("abc123".into(), "A"));
        db.attach(&root, Node::folder("abd456".into(), "B"));
        assert_eq!(db.resolve_prefix("abc").unwrap().name, "A");
        assert_eq!(
            db.resolve_prefix("ab"),
            Err(LookupError::Ambiguous("ab".into()))
        );
        assert_eq!(
            db.resolve_prefix("zz"),
            Err(LookupError::NotFound("zz".into()))
        );
    }
}
