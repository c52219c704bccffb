//! Versioned shapes of persisted data and the upgrades between them.
//!
//! File content:
//! - V1: `{read_text: string, copy_blocks: [string]}` (plain text only)
//! - V2: `{read_doc: doc, copy_docs: [doc]}` (current). Older bundle exports
//!   wrote the same documents as `{read_rich: doc, copy_blocks: [doc]}`.
//!
//! Store:
//! - V1: a single tree under an optional top-level `root_id`
//! - V2: `quickcopy_root_id` + `favorites_root_id` (current)

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::issues::IssueSink;
use super::rich_codec::{parse_read_doc, parse_rich_doc, rich_doc_to_value};
use crate::model::{
    Database, FAVORITES_NAME, FileContent, Node, NodeId, NodeType, QUICKCOPY_NAME, RichDocument,
};

// ---------------------------------------------------------------------------
// File content
// ---------------------------------------------------------------------------

/// A file's `content` payload as found on disk.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentSchema {
    V1(PlainContent),
    V2(RichContent),
}

/// Pre-rich-text content.
#[derive(Debug, Clone, PartialEq)]
pub struct PlainContent {
    pub read_text: String,
    pub copy_blocks: Vec<String>,
}

/// Current content, still as raw JSON documents.
#[derive(Debug, Clone, PartialEq)]
pub struct RichContent {
    pub read_doc: Value,
    pub copy_docs: Vec<Value>,
}

impl ContentSchema {
    /// Classify a raw `content` value. Anything that is not an object is an
    /// empty V1 payload.
    pub fn detect(raw: Option<&Value>) -> ContentSchema {
        let empty = Map::new();
        let map = raw.and_then(Value::as_object).unwrap_or(&empty);

        if map.contains_key("read_doc") || map.contains_key("copy_docs") {
            let read_doc = map.get("read_doc").cloned().unwrap_or(Value::Null);
            let copy_docs = match map.get("copy_docs") {
                Some(Value::Array(docs)) => docs.clone(),
                _ => Vec::new(),
            };
            return ContentSchema::V2(RichContent {
                read_doc,
                copy_docs,
            });
        }
        if let Some(read_rich) = map.get("read_rich").filter(|v| v.is_object()) {
            let copy_docs = match map.get("copy_blocks") {
                Some(Value::Array(docs)) => docs.clone(),
                _ => Vec::new(),
            };
            return ContentSchema::V2(RichContent {
                read_doc: read_rich.clone(),
                copy_docs,
            });
        }

        let read_text = map
            .get("read_text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let copy_blocks = match map.get("copy_blocks") {
            Some(Value::Array(blocks)) => blocks
                .iter()
                .map(|b| match b {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        };
        ContentSchema::V1(PlainContent {
            read_text,
            copy_blocks,
        })
    }

    /// Bring any version up to the current one.
    pub fn upgrade(self) -> RichContent {
        match self {
            ContentSchema::V1(plain) => plain.upgrade(),
            ContentSchema::V2(rich) => rich,
        }
    }
}

impl PlainContent {
    /// V1 → V2: each string becomes a document with no tags. No blocks
    /// becomes one blank block.
    pub fn upgrade(self) -> RichContent {
        let mut copy_blocks = self.copy_blocks;
        if copy_blocks.is_empty() {
            copy_blocks.push(String::new());
        }
        RichContent {
            read_doc: rich_doc_to_value(&RichDocument::plain(self.read_text)),
            copy_docs: copy_blocks
                .into_iter()
                .map(|text| rich_doc_to_value(&RichDocument::plain(text)))
                .collect(),
        }
    }
}

impl RichContent {
    /// Decode the documents. An empty snippet list becomes one blank snippet.
    pub fn into_content(self, location: &str, sink: &mut IssueSink) -> FileContent {
        let (read_doc, meta) = parse_read_doc(&self.read_doc, &format!("{} read_doc", location), sink);
        let copy_docs = self
            .copy_docs
            .iter()
            .enumerate()
            .map(|(i, raw)| parse_rich_doc(raw, &format!("{} copy_docs[{}]", location, i), sink))
            .collect();
        FileContent::from_parts(read_doc, copy_docs, meta)
    }
}

/// Parse any version of a file's `content` into the current model.
pub fn upgrade_content(raw: Option<&Value>, location: &str, sink: &mut IssueSink) -> FileContent {
    ContentSchema::detect(raw).upgrade().into_content(location, sink)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Which store layout a document uses, decided after its nodes are parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSchema {
    /// No usable `quickcopy_root_id`.
    V1 { legacy_root_id: Option<NodeId> },
    V2 {
        quickcopy_root_id: NodeId,
        favorites_root_id: Option<NodeId>,
    },
}

impl StoreSchema {
    pub fn detect(data: &Map<String, Value>, nodes: &IndexMap<NodeId, Node>) -> StoreSchema {
        let root_field = |key: &str| -> Option<NodeId> {
            data.get(key)
                .and_then(Value::as_str)
                .filter(|id| nodes.get(*id).is_some_and(Node::is_folder))
                .map(str::to_string)
        };

        match root_field("quickcopy_root_id") {
            Some(quickcopy_root_id) => StoreSchema::V2 {
                quickcopy_root_id,
                favorites_root_id: root_field("favorites_root_id"),
            },
            None => StoreSchema::V1 {
                legacy_root_id: root_field("root_id"),
            },
        }
    }

    /// Build the database, synthesizing whatever roots the version lacks.
    pub fn upgrade(self, nodes: IndexMap<NodeId, Node>) -> Database {
        match self {
            StoreSchema::V1 { legacy_root_id } => upgrade_single_root(nodes, legacy_root_id),
            StoreSchema::V2 {
                quickcopy_root_id,
                favorites_root_id,
            } => {
                let mut nodes = nodes;
                let favorites_root_id = favorites_root_id
                    .filter(|id| *id != quickcopy_root_id)
                    .unwrap_or_else(|| {
                        let favorites = Node::folder(fresh_id(&nodes), FAVORITES_NAME);
                        let id = favorites.id.clone();
                        nodes.insert(id.clone(), favorites);
                        id
                    });
                Database {
                    quickcopy_root_id,
                    favorites_root_id,
                    nodes,
                }
            }
        }
    }
}

/// V1 → V2: fresh QuickCopy and Favorites roots. The legacy root folder goes
/// first under QuickCopy, then every other node no folder references.
/// Unreferenced shortcuts go under Favorites instead. A folder that also
/// lists the legacy root loses that entry, so the root keeps one parent.
fn upgrade_single_root(mut nodes: IndexMap<NodeId, Node>, legacy_root_id: Option<NodeId>) -> Database {
    if let Some(root) = &legacy_root_id {
        for node in nodes.values_mut() {
            if let Some(children) = node.children_mut() {
                children.retain(|c| c != root);
            }
        }
    }
    let referenced: std::collections::HashSet<&str> = nodes
        .values()
        .flat_map(|n| n.children().iter().map(String::as_str))
        .collect();

    let mut top_level = Vec::new();
    let mut shortcuts = Vec::new();
    if let Some(root) = &legacy_root_id {
        top_level.push(root.clone());
    }
    for node in nodes.values() {
        if referenced.contains(node.id.as_str()) || Some(&node.id) == legacy_root_id.as_ref() {
            continue;
        }
        if node.node_type() == NodeType::Shortcut {
            shortcuts.push(node.id.clone());
        } else {
            top_level.push(node.id.clone());
        }
    }

    let mut quickcopy = Node::folder(fresh_id(&nodes), QUICKCOPY_NAME);
    let mut favorites = Node::folder(fresh_id(&nodes), FAVORITES_NAME);
    if let Some(children) = quickcopy.children_mut() {
        *children = top_level;
    }
    if let Some(children) = favorites.children_mut() {
        *children = shortcuts;
    }

    let mut db = Database {
        quickcopy_root_id: quickcopy.id.clone(),
        favorites_root_id: favorites.id.clone(),
        nodes: IndexMap::with_capacity(nodes.len() + 2),
    };
    db.nodes.insert(favorites.id.clone(), favorites);
    db.nodes.insert(quickcopy.id.clone(), quickcopy);
    db.nodes.extend(nodes);
    db
}

fn fresh_id(nodes: &IndexMap<NodeId, Node>) -> NodeId {
    loop {
        let id = crate::model::new_id();
        if !nodes.contains_key(&id) {
            return id;
        }
    }
}
