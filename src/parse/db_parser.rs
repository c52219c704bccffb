use indexmap::IndexMap;
use serde_json::Value;

use super::issues::{IssueSink, LoadIssue};
use super::legacy::{upgrade_content, StoreSchema};
use super::rich_codec::kind_of;
use crate::model::{Database, Node, NodeId, NodeKind, NodeType, PLACEHOLDER_NAME};
use crate::ops::favorites;

/// A node entry parsed from disk, with the legacy flag it may carry.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedNode {
    pub node: Node,
    /// Legacy `pinned: true`
    pub pinned: bool,
}

/// Parse one raw node entry. `key` is the mapping key, used when the entry
/// has no `id` of its own. Returns `None` (with an issue) for entries that
/// are not objects.
pub fn parse_node_entry(key: &str, raw: &Value, sink: &mut IssueSink) -> Option<ParsedNode> {
    let location = format!("node {}", key);
    let Some(map) = raw.as_object() else {
        sink.push(&location, format!("skipped entry that is {}", kind_of(raw)));
        return None;
    };

    let id: NodeId = map
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .unwrap_or(key)
        .to_string();

    let node_type = match map.get("type").and_then(Value::as_str) {
        Some(t) => NodeType::parse(t).unwrap_or_else(|| {
            sink.push(&location, format!("unknown type {:?}, treating as folder", t));
            NodeType::Folder
        }),
        None => NodeType::Folder,
    };

    let name = map
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(PLACEHOLDER_NAME)
        .to_string();

    let kind = match node_type {
        NodeType::Folder => {
            let children = match map.get("children") {
                Some(Value::Array(raw_children)) => raw_children
                    .iter()
                    .filter_map(|c| {
                        let child = c.as_str().map(str::to_string);
                        if child.is_none() {
                            sink.push(&location, format!("dropped child reference {}", c));
                        }
                        child
                    })
                    .collect(),
                _ => Vec::new(),
            };
            NodeKind::Folder { children }
        }
        NodeType::File => NodeKind::File {
            content: upgrade_content(map.get("content"), &location, sink),
        },
        NodeType::Shortcut => NodeKind::Shortcut {
            target_id: map
                .get("target_id")
                .and_then(Value::as_str)
                .map(str::to_string),
        },
    };

    Some(ParsedNode {
        node: Node { id, name, kind },
        pinned: map.get("pinned") == Some(&Value::Bool(true)),
    })
}

/// Parse a `nodes` mapping. Later duplicates of an ID replace earlier ones.
pub fn parse_node_map(raw: Option<&Value>, sink: &mut IssueSink) -> Vec<ParsedNode> {
    match raw {
        Some(Value::Object(entries)) => entries
            .iter()
            .filter_map(|(key, raw)| parse_node_entry(key, raw, sink))
            .collect(),
        None | Some(Value::Null) => Vec::new(),
        Some(other) => {
            sink.push("nodes", format!("expected a mapping, found {}", kind_of(other)));
            Vec::new()
        }
    }
}

/// Parse a store document of any supported version into the current model.
///
/// Order: nodes (with content upgrades) → store layout upgrade (roots) →
/// Favorites root → legacy `pinned` flags become Favorites shortcuts.
/// Never fails; whatever had to be skipped is returned as issues.
pub fn parse_database(data: &Value) -> (Database, Vec<LoadIssue>) {
    let Some(map) = data.as_object() else {
        return (
            Database::blank(),
            vec![LoadIssue::new("store", format!("top level is {}", kind_of(data)))],
        );
    };

    let mut sink = IssueSink::new();
    let parsed = parse_node_map(map.get("nodes"), &mut sink);

    let mut pinned = Vec::new();
    let mut nodes: IndexMap<NodeId, Node> = IndexMap::with_capacity(parsed.len());
    for entry in parsed {
        if entry.pinned {
            pinned.push(entry.node.id.clone());
        }
        nodes.insert(entry.node.id.clone(), entry.node);
    }

    let schema = StoreSchema::detect(map, &nodes);
    if let StoreSchema::V1 { legacy_root_id } = &schema {
        tracing::info!(?legacy_root_id, "upgrading single-root store");
    }
    let mut db = schema.upgrade(nodes);

    for file_id in pinned {
        if let Err(e) = favorites::ensure_favorite(&mut db, &file_id) {
            sink.push(format!("node {}", file_id), format!("pinned flag ignored: {}", e));
        }
    }

    (db, sink.into_vec())
}
