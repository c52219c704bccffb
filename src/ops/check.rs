use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::model::{Database, NodeId, NodeType};

/// Structured result from `qc check`, suitable for --json output.
#[derive(Debug, Default, Serialize)]
pub struct CheckResult {
    pub valid: bool,
    pub errors: Vec<CheckError>,
    pub warnings: Vec<CheckWarning>,
}

/// A structural error (the tree invariant is broken).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckError {
    /// A root ID does not resolve to a folder
    #[serde(rename = "missing_root")]
    MissingRoot { root: &'static str, node_id: NodeId },
    /// A folder lists a child that is not in the store
    #[serde(rename = "dangling_child")]
    DanglingChild { folder_id: NodeId, child_id: NodeId },
    /// A node is listed by more than one folder (or twice by one)
    #[serde(rename = "multiple_parents")]
    MultipleParents { node_id: NodeId, parent_ids: Vec<NodeId> },
    /// A folder is its own ancestor
    #[serde(rename = "cycle")]
    Cycle { node_id: NodeId },
    /// A node no folder lists
    #[serde(rename = "orphan")]
    Orphan { node_id: NodeId, name: String },
}

/// A non-critical issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CheckWarning {
    /// Shortcut whose target is missing or not a file
    #[serde(rename = "dangling_shortcut")]
    DanglingShortcut {
        shortcut_id: NodeId,
        target_id: Option<NodeId>,
    },
    /// More than one favorite for the same file
    #[serde(rename = "duplicate_favorite")]
    DuplicateFavorite {
        target_id: NodeId,
        shortcut_ids: Vec<NodeId>,
    },
    /// Something other than a shortcut inside Favorites
    #[serde(rename = "non_shortcut_favorite")]
    NonShortcutFavorite { node_id: NodeId },
}

// ---------------------------------------------------------------------------
// Main check entry point
// ---------------------------------------------------------------------------

/// Validate a store and return structured results. Read-only.
///
/// Checks performed:
/// 1. Both roots resolve to folders
/// 2. Every child reference resolves
/// 3. No node has two parents, no folder contains itself
/// 4. Every non-root node is listed somewhere
/// 5. Warnings for dangling shortcuts and odd Favorites contents
pub fn check_store(db: &Database) -> CheckResult {
    let mut result = CheckResult::default();

    for (root, id) in [
        ("quickcopy", &db.quickcopy_root_id),
        ("favorites", &db.favorites_root_id),
    ] {
        if db.folder(id).is_none() {
            result.errors.push(CheckError::MissingRoot {
                root,
                node_id: id.clone(),
            });
        }
    }

    let mut parents: HashMap<&str, Vec<NodeId>> = HashMap::new();
    for node in db.nodes.values() {
        for child in node.children() {
            if !db.contains(child) {
                result.errors.push(CheckError::DanglingChild {
                    folder_id: node.id.clone(),
                    child_id: child.clone(),
                });
            }
            parents.entry(child.as_str()).or_default().push(node.id.clone());
        }
    }

    for node in db.nodes.values() {
        match parents.get(node.id.as_str()) {
            Some(parent_ids) if parent_ids.len() > 1 => {
                result.errors.push(CheckError::MultipleParents {
                    node_id: node.id.clone(),
                    parent_ids: parent_ids.clone(),
                });
            }
            None if !db.is_root(&node.id) => {
                result.errors.push(CheckError::Orphan {
                    node_id: node.id.clone(),
                    name: node.name.clone(),
                });
            }
            _ => {}
        }
    }

    for id in find_cycles(db) {
        result.errors.push(CheckError::Cycle { node_id: id });
    }

    check_shortcuts(db, &mut result);

    result.valid = result.errors.is_empty();
    result
}

/// Folders reachable from their own children.
fn find_cycles(db: &Database) -> Vec<NodeId> {
    let mut out = Vec::new();
    for node in db.nodes.values().filter(|n| n.is_folder()) {
        let mut seen = HashSet::new();
        let mut stack: Vec<&str> = node.children().iter().map(String::as_str).collect();
        while let Some(id) = stack.pop() {
            if id == node.id {
                out.push(node.id.clone());
                break;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(child) = db.get(id) {
                stack.extend(child.children().iter().map(String::as_str));
            }
        }
    }
    out
}

fn check_shortcuts(db: &Database, result: &mut CheckResult) {
    for node in db.nodes.values() {
        if node.node_type() != NodeType::Shortcut {
            continue;
        }
        let live = node
            .target_id()
            .and_then(|t| db.get(t))
            .is_some_and(|t| t.is_file());
        if !live {
            result.warnings.push(CheckWarning::DanglingShortcut {
                shortcut_id: node.id.clone(),
                target_id: node.target_id().map(str::to_string),
            });
        }
    }

    let mut by_target: HashMap<&str, Vec<NodeId>> = HashMap::new();
    let favorites = db.favorites_root().map(|f| f.children()).unwrap_or(&[]);
    for id in favorites {
        let Some(node) = db.get(id) else {
            continue;
        };
        match node.target_id() {
            Some(target) => by_target.entry(target).or_default().push(node.id.clone()),
            None if node.node_type() != NodeType::Shortcut => {
                result.warnings.push(CheckWarning::NonShortcutFavorite {
                    node_id: node.id.clone(),
                });
            }
            None => {}
        }
    }

    let mut duplicates: Vec<(&str, Vec<NodeId>)> = by_target
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .collect();
    duplicates.sort();
    for (target, shortcut_ids) in duplicates {
        result.warnings.push(CheckWarning::DuplicateFavorite {
            target_id: target.to_string(),
            shortcut_ids,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileContent, Node};
    use crate::ops::favorites::ensure_favorite;

    fn healthy() -> Database {
        let mut db = Database::blank();
        let root = db.quickcopy_root_id.clone();
        db.attach(&root, Node::folder("d".into(), "Deeds"));
        db.attach("d", Node::file("f".into(), "Grant", FileContent::new()));
        ensure_favorite(&mut db, "f").unwrap();
        db
    }

    #[test]
    fn test_healthy_store_is_valid() {
        let result = check_store(&healthy());
        assert!(result.valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_structural_errors() {
        let mut db = healthy();
        let root = db.quickcopy_root_id.clone();
        db.get_mut(&root).unwrap().children_mut().unwrap().push("f".into());
        db.get_mut("d").unwrap().children_mut().unwrap().push("ghost".into());
        db.nodes.insert("lost".into(), Node::folder("lost".into(), "Lost"));

        let result = check_store(&db);
        assert!(!result.valid);
        assert!(result.errors.contains(&CheckError::DanglingChild {
            folder_id: "d".into(),
            child_id: "ghost".into()
        }));
        assert!(result.errors.contains(&CheckError::MultipleParents {
            node_id: "f".into(),
            parent_ids: vec!["d".into(), root.clone()]
        }));
        assert!(result.errors.contains(&CheckError::Orphan {
            node_id: "lost".into(),
            name: "Lost".into()
        }));
    }

    #[test]
    fn test_cycle_detected() {
        let mut db = healthy();
        db.attach("d", Node::folder("e".into(), "E"));
        db.get_mut("e").unwrap().children_mut().unwrap().push("d".into());
        let result = check_store(&db);
        assert!(result.errors.contains(&CheckError::Cycle { node_id: "d".into() }));
        assert!(result.errors.contains(&CheckError::Cycle { node_id: "e".into() }));
    }

    #[test]
    fn test_shortcut_warnings() {
        let mut db = healthy();
        let fav = db.favorites_root_id.clone();
        db.attach(&fav, Node::shortcut("dup".into(), "Grant", "f".into()));
        db.attach(&fav, Node::shortcut("gone".into(), "Gone", "nowhere".into()));
        db.attach(&fav, Node::folder("odd".into(), "Odd"));

        let result = check_store(&db);
        assert!(result.valid);
        assert!(result.warnings.contains(&CheckWarning::DanglingShortcut {
            shortcut_id: "gone".into(),
            target_id: Some("nowhere".into())
        }));
        assert!(result.warnings.contains(&CheckWarning::NonShortcutFavorite {
            node_id: "odd".into()
        }));
        assert!(result.warnings.iter().any(|w| matches!(
            w,
            CheckWarning::DuplicateFavorite { target_id, .. } if target_id == "f"
        )));
    }
}
