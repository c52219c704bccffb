//! Subtree bundles and whole-store merges.
//!
//! Everything that enters the store from outside gets a fresh ID, so imported
//! content can never alias a node that already exists.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde_json::{Map, Value, json};

use crate::model::{Database, Node, NodeId, NodeKind};
use crate::ops::{favorites, tree_ops};
use crate::parse::rich_codec::kind_of;
use crate::parse::{IssueSink, LoadIssue, node_to_value, parse_database, parse_node_entry};

/// Error type for bundle operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BundleError {
    #[error("node not found: {0}")]
    NotFound(String),
    #[error("target is not a folder: {0}")]
    TargetNotFolder(String),
    #[error("bundle is {0}, expected a JSON object")]
    NotAnObject(&'static str),
    #[error("bundle has no nodes")]
    MissingNodes,
    #[error("bundle root {0:?} is not one of the bundle's nodes")]
    MissingRoot(String),
}

/// An exported subtree: its root and every node beneath it.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub root_id: NodeId,
    pub nodes: IndexMap<NodeId, Node>,
}

impl Bundle {
    /// `{bundle_root_id, nodes: {id: node}}` with the same node shape as the
    /// store.
    pub fn to_value(&self) -> Value {
        let nodes: Map<String, Value> = self
            .nodes
            .iter()
            .map(|(id, node)| (id.clone(), node_to_value(node)))
            .collect();
        json!({
            "bundle_root_id": self.root_id,
            "nodes": nodes,
        })
    }

    /// Parse a bundle document. Node entries go through the store's node
    /// parser, so every content version is accepted. Nodes are keyed by
    /// their mapping key; an inner `id` that disagrees is ignored.
    pub fn from_value(value: &Value, sink: &mut IssueSink) -> Result<Bundle, BundleError> {
        let map = value.as_object().ok_or(BundleError::NotAnObject(kind_of(value)))?;
        let raw_nodes = match map.get("nodes") {
            Some(Value::Object(raw)) if !raw.is_empty() => raw,
            _ => return Err(BundleError::MissingNodes),
        };

        let mut nodes = IndexMap::with_capacity(raw_nodes.len());
        for (key, raw) in raw_nodes {
            if let Some(parsed) = parse_node_entry(key, raw, sink) {
                let mut node = parsed.node;
                node.id = key.clone();
                nodes.insert(key.clone(), node);
            }
        }
        if nodes.is_empty() {
            return Err(BundleError::MissingNodes);
        }

        let root_id = map
            .get("bundle_root_id")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !nodes.contains_key(root_id) {
            return Err(BundleError::MissingRoot(root_id.to_string()));
        }
        Ok(Bundle {
            root_id: root_id.to_string(),
            nodes,
        })
    }
}

/// Outcome of `import_bundle`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportResult {
    /// New ID of the bundle root, now the last child of the target folder
    pub root_id: NodeId,
    pub imported: usize,
    /// Bundle nodes not reachable from the bundle root
    pub skipped: usize,
    pub issues: Vec<LoadIssue>,
}

/// Outcome of `merge_store`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    /// New ID of the incoming QuickCopy root
    pub root_id: NodeId,
    pub imported: usize,
    pub favorites_added: usize,
    /// Incoming favorites dropped because their file already had one
    pub favorites_skipped: usize,
    pub issues: Vec<LoadIssue>,
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Collect a node and everything beneath it. Shortcut targets are kept as
/// they are, even when the target is outside the subtree.
pub fn export_bundle(db: &Database, root_id: &str) -> Result<Bundle, BundleError> {
    if !db.contains(root_id) {
        return Err(BundleError::NotFound(root_id.to_string()));
    }
    let nodes = tree_ops::subtree_ids(db, root_id)
        .into_iter()
        .filter_map(|id| db.get(&id).cloned().map(|n| (id, n)))
        .collect();
    Ok(Bundle {
        root_id: root_id.to_string(),
        nodes,
    })
}

/// The whole store in its `data.json` shape, as `merge_store` reads it.
pub fn export_store(db: &Database) -> Value {
    crate::parse::serialize_database(db)
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Graft a bundle under `target_folder_id`. Nothing changes on error.
pub fn import_bundle(
    db: &mut Database,
    bundle: &Value,
    target_folder_id: &str,
) -> Result<ImportResult, BundleError> {
    require_target(db, target_folder_id)?;
    let mut sink = IssueSink::new();
    let bundle = Bundle::from_value(bundle, &mut sink)?;

    let total = bundle.nodes.len();
    let reach = walk_reachable(&bundle.nodes, std::slice::from_ref(&bundle.root_id), &HashSet::new());
    let table = remap_into(db, bundle.nodes, &reach);
    let Some(root_id) = table.get(&bundle.root_id).cloned() else {
        return Err(BundleError::MissingRoot(bundle.root_id));
    };
    attach_child(db, target_folder_id, &root_id);

    tracing::info!(target_folder_id, imported = table.len(), "imported bundle");
    Ok(ImportResult {
        root_id,
        imported: table.len(),
        skipped: total - table.len(),
        issues: sink.into_vec(),
    })
}

/// Merge another whole store: its QuickCopy root goes under
/// `target_folder_id`, its favorites join ours.
pub fn merge_store(
    db: &mut Database,
    store: &Value,
    target_folder_id: &str,
) -> Result<MergeResult, BundleError> {
    require_target(db, target_folder_id)?;
    let map = store.as_object().ok_or(BundleError::NotAnObject(kind_of(store)))?;
    if !matches!(map.get("nodes"), Some(Value::Object(raw)) if !raw.is_empty()) {
        return Err(BundleError::MissingNodes);
    }

    let (incoming, issues) = parse_database(store);
    let incoming_favorites: Vec<NodeId> = incoming
        .favorites_root()
        .map(|f| f.children().to_vec())
        .unwrap_or_default();

    let mut roots = vec![incoming.quickcopy_root_id.clone()];
    roots.extend(incoming_favorites.iter().cloned());
    let excluded = HashSet::from([incoming.favorites_root_id.clone()]);
    let reach = walk_reachable(&incoming.nodes, &roots, &excluded);
    let in_folders: HashSet<NodeId> = reach.children.values().flatten().cloned().collect();

    let table = remap_into(db, incoming.nodes, &reach);
    let Some(root_id) = table.get(&incoming.quickcopy_root_id).cloned() else {
        return Err(BundleError::MissingRoot(incoming.quickcopy_root_id));
    };
    attach_child(db, target_folder_id, &root_id);

    let favorites_root = db.favorites_root_id.clone();
    let mut favorites_added = 0;
    let mut favorites_skipped = 0;
    for old in &incoming_favorites {
        let Some(new) = table.get(old) else {
            continue;
        };
        let listed = in_folders.contains(old)
            || db
                .favorites_root()
                .is_some_and(|f| f.children().contains(new));
        if listed {
            continue;
        }
        let target_favorited = db
            .get(new)
            .and_then(Node::target_id)
            .is_some_and(|t| favorites::is_favorited(db, t));
        if target_favorited {
            db.nodes.shift_remove(new);
            favorites_skipped += 1;
            continue;
        }
        attach_child(db, &favorites_root, new);
        favorites_added += 1;
    }

    tracing::info!(target_folder_id, imported = table.len(), favorites_added, "merged store");
    Ok(MergeResult {
        root_id,
        imported: table.len(),
        favorites_added,
        favorites_skipped,
        issues,
    })
}

fn require_target(db: &Database, target_folder_id: &str) -> Result<(), BundleError> {
    match db.get(target_folder_id) {
        Some(node) if node.is_folder() => Ok(()),
        _ => Err(BundleError::TargetNotFolder(target_folder_id.to_string())),
    }
}

fn attach_child(db: &mut Database, folder_id: &str, child_id: &str) {
    if let Some(children) = db.get_mut(folder_id).and_then(Node::children_mut) {
        children.push(child_id.to_string());
    }
}

/// Nodes reachable from a set of roots, in pre-order. A node listed by
/// several folders stays with the first one that reaches it.
struct Reachable {
    order: Vec<NodeId>,
    children: HashMap<NodeId, Vec<NodeId>>,
}

fn walk_reachable(
    nodes: &IndexMap<NodeId, Node>,
    roots: &[NodeId],
    excluded: &HashSet<NodeId>,
) -> Reachable {
    let mut claimed = excluded.clone();
    let mut order = Vec::new();
    let mut children = HashMap::new();

    for root in roots {
        if !nodes.contains_key(root) || !claimed.insert(root.clone()) {
            continue;
        }
        let mut stack = vec![root.clone()];
        while let Some(id) = stack.pop() {
            let kept: Vec<NodeId> = match nodes.get(&id) {
                Some(node) if node.is_folder() => node
                    .children()
                    .iter()
                    .filter(|c| nodes.contains_key(*c) && claimed.insert((*c).clone()))
                    .cloned()
                    .collect(),
                _ => Vec::new(),
            };
            stack.extend(kept.iter().rev().cloned());
            children.insert(id.clone(), kept);
            order.push(id);
        }
    }

    Reachable { order, children }
}

/// Give every reachable node a fresh ID and insert it. Children and shortcut
/// targets are rewritten; references to nodes outside the table are dropped.
fn remap_into(
    db: &mut Database,
    mut nodes: IndexMap<NodeId, Node>,
    reach: &Reachable,
) -> HashMap<NodeId, NodeId> {
    let mut table = HashMap::with_capacity(reach.order.len());
    let mut issued = HashSet::with_capacity(reach.order.len());
    for old in &reach.order {
        let mut new = db.fresh_id();
        while !issued.insert(new.clone()) {
            new = db.fresh_id();
        }
        table.insert(old.clone(), new);
    }

    for old in &reach.order {
        let (Some(node), Some(new_id)) = (nodes.shift_remove(old), table.get(old)) else {
            continue;
        };
        let kind = match node.kind {
            NodeKind::Folder { .. } => NodeKind::Folder {
                children: reach
                    .children
                    .get(old)
                    .map(|kids| kids.iter().filter_map(|c| table.get(c).cloned()).collect())
                    .unwrap_or_default(),
            },
            NodeKind::File { content } => NodeKind::File { content },
            NodeKind::Shortcut { target_id } => NodeKind::Shortcut {
                target_id: target_id.and_then(|t| table.get(&t).cloned()),
            },
        };
        db.nodes.insert(
            new_id.clone(),
            Node {
                id: new_id.clone(),
                name: node.name,
                kind,
            },
        );
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileContent, RichDocument};
    use crate::ops::tree_ops::create_folder;
    use pretty_assertions::assert_eq;

    fn sample() -> Database {
        let mut db = Database::blank();
        let root = db.quickcopy_root_id.clone();
        db.attach(&root, Node::folder("d".into(), "Deeds"));
        let mut content = FileContent::new();
        content.read_doc = RichDocument::plain("grant text");
        db.attach("d", Node::file("f1".into(), "Grant", content));
        db.attach("d", Node::folder("d2".into(), "Old"));
        db.attach("d2", Node::file("f2".into(), "Lease", FileContent::new()));
        db.attach(&root, Node::file("f3".into(), "Outside", FileContent::new()));
        db.attach("d", Node::shortcut("s1".into(), "Outside", "f3".into()));
        db
    }

    fn ids(db: &Database) -> HashSet<NodeId> {
        db.nodes.keys().cloned().collect()
    }

    #[test]
    fn test_export_collects_pre_order() {
        let db = sample();
        let bundle = export_bundle(&db, "d").unwrap();
        let order: Vec<&str> = bundle.nodes.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["d", "f1", "d2", "f2", "s1"]);
        let value = bundle.to_value();
        assert_eq!(value["bundle_root_id"], json!("d"));
        assert_eq!(value["nodes"]["s1"]["target_id"], json!("f3"));
    }

    #[test]
    fn test_import_remaps_every_id() {
        let mut db = sample();
        let bundle = export_bundle(&db, "d").unwrap().to_value();
        let root = db.quickcopy_root_id.clone();
        let target = create_folder(&mut db, &root, "Inbox").unwrap();
        let before = ids(&db);
        let originals: Vec<Node> = db
            .nodes
            .values()
            .filter(|n| n.id != target)
            .cloned()
            .collect();

        let result = import_bundle(&mut db, &bundle, &target).unwrap();
        assert_eq!(result.imported, 5);
        assert_eq!(result.skipped, 0);
        assert!(!before.contains(&result.root_id));
        assert_eq!(db.get(&target).unwrap().children(), &[result.root_id.clone()]);

        // pre-existing nodes untouched
        for node in &originals {
            assert_eq!(db.get(&node.id), Some(node));
        }
        let copy = db.get(&result.root_id).unwrap();
        assert_eq!(copy.name, "Deeds");
        assert_eq!(copy.children().len(), 3);
        for child in copy.children() {
            assert!(!before.contains(child));
        }
        // shortcut target was outside the bundle
        let shortcut = db.get(&copy.children()[2]).unwrap();
        assert_eq!(shortcut.target_id(), None);
    }

    #[test]
    fn test_import_twice_gives_distinct_copies() {
        let mut db = sample();
        let bundle = export_bundle(&db, "d2").unwrap().to_value();
        let a = import_bundle(&mut db, &bundle, "d").unwrap();
        let b = import_bundle(&mut db, &bundle, "d").unwrap();
        assert_ne!(a.root_id, b.root_id);
        assert_eq!(db.get("d").unwrap().children().len(), 5);
    }

    #[test]
    fn test_import_rejects_bad_input_without_mutation() {
        let mut db = sample();
        let before = db.clone();
        let good = export_bundle(&db, "d").unwrap().to_value();
        assert_eq!(
            import_bundle(&mut db, &good, "f1"),
            Err(BundleError::TargetNotFolder("f1".into()))
        );
        assert_eq!(
            import_bundle(&mut db, &json!({"bundle_root_id": "x"}), "d"),
            Err(BundleError::MissingNodes)
        );
        assert_eq!(
            import_bundle(&mut db, &json!({"bundle_root_id": "x", "nodes": {"y": {}}}), "d"),
            Err(BundleError::MissingRoot("x".into()))
        );
        assert_eq!(
            import_bundle(&mut db, &json!([]), "d"),
            Err(BundleError::NotAnObject("an array"))
        );
        assert_eq!(db, before);
    }

    #[test]
    fn test_import_keys_nodes_by_mapping_key() {
        let mut db = sample();
        let bundle = json!({
            "bundle_root_id": "k",
            "nodes": {
                "k": {"id": "inner", "type": "folder", "name": "Keyed", "children": ["f"]},
                "f": {"id": "k", "type": "file", "name": "Body"}
            }
        });
        let result = import_bundle(&mut db, &bundle, "d").unwrap();
        assert_eq!(result.imported, 2);
        assert_eq!(result.skipped, 0);

        let folder = db.get(&result.root_id).unwrap();
        assert_eq!(folder.name, "Keyed");
        assert_eq!(folder.children().len(), 1);
        assert_eq!(db.get(&folder.children()[0]).unwrap().name, "Body");
    }

    #[test]
    fn test_import_breaks_cycles_and_shared_children() {
        let mut db = sample();
        let bundle = json!({
            "bundle_root_id": "a",
            "nodes": {
                "a": {"type": "folder", "name": "A", "children": ["b", "c"]},
                "b": {"type": "folder", "name": "B", "children": ["a", "c"]},
                "c": {"type": "file", "name": "C", "content": {"read_text": "legacy", "copy_blocks": []}},
                "stray": {"type": "folder", "name": "Stray"}
            }
        });
        let before = db.nodes.len();
        let result = import_bundle(&mut db, &bundle, "d").unwrap();
        assert_eq!(result.imported, 3);
        assert_eq!(result.skipped, 1);
        assert_eq!(db.nodes.len(), before + 3);

        let a = db.get(&result.root_id).unwrap();
        assert_eq!(a.children().len(), 2);
        let b = db.get(&a.children()[0]).unwrap();
        assert!(b.children().is_empty());
        let c = db.get(&a.children()[1]).unwrap();
        assert_eq!(c.content().unwrap().read_doc.text, "legacy");
    }

    #[test]
    fn test_merge_store_joins_favorites() {
        let mut incoming = sample();
        favorites::ensure_favorite(&mut incoming, "f1").unwrap();
        favorites::ensure_favorite(&mut incoming, "f2").unwrap();
        let store = export_store(&incoming);

        let mut db = Database::blank();
        let root = db.quickcopy_root_id.clone();
        let result = merge_store(&mut db, &store, &root).unwrap();

        assert_eq!(result.favorites_added, 2);
        assert_eq!(result.favorites_skipped, 0);
        assert_eq!(db.quickcopy_root().unwrap().children(), &[result.root_id.clone()]);
        assert_eq!(db.get(&result.root_id).unwrap().name, "QuickCopy");
        // 2 own roots + 6 incoming nodes + incoming QuickCopy root + 2 favorites
        assert_eq!(db.nodes.len(), 11);
        for fav in db.favorites() {
            let target = fav.target_id().unwrap();
            assert!(db.get(target).unwrap().is_file());
        }
        assert!(!ids(&db).contains(&incoming.favorites_root_id));
    }

    #[test]
    fn test_merge_into_itself_keeps_copied_favorites() {
        let mut db = sample();
        favorites::ensure_favorite(&mut db, "f1").unwrap();
        let store = export_store(&db);
        let root = db.quickcopy_root_id.clone();

        let result = merge_store(&mut db, &store, &root).unwrap();
        // the copy of f1 is a different file, so its favorite is kept
        assert_eq!(result.favorites_added, 1);
        assert_eq!(db.favorites().count(), 2);
        assert!(favorites::is_favorited(&db, "f1"));
    }

    #[test]
    fn test_merge_drops_second_favorite_of_one_file() {
        let mut db = sample();
        let fav_root = db.favorites_root_id.clone();
        let store = json!({
            "quickcopy_root_id": "q",
            "favorites_root_id": "fv",
            "nodes": {
                "q": {"type": "folder", "name": "QuickCopy", "children": ["x"]},
                "x": {"type": "file", "name": "X"},
                "fv": {"type": "folder", "name": "Favorites", "children": ["s1", "s2"]},
                "s1": {"type": "shortcut", "name": "X", "target_id": "x"},
                "s2": {"type": "shortcut", "name": "X", "target_id": "x"}
            }
        });
        let before = db.nodes.len();
        let result = merge_store(&mut db, &store, "d").unwrap();
        assert_eq!(result.favorites_added, 1);
        assert_eq!(result.favorites_skipped, 1);
        assert_eq!(db.get(&fav_root).unwrap().children().len(), 1);
        assert_eq!(db.nodes.len(), before + 3);
        assert_eq!(db.get("d").unwrap().children().last(), Some(&result.root_id));
    }

    #[test]
    fn test_merge_rejects_non_store() {
        let mut db = sample();
        assert_eq!(
            merge_store(&mut db, &json!({"nodes": {}}), "d"),
            Err(BundleError::MissingNodes)
        );
    }
}
