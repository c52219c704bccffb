use std::collections::HashSet;

use serde::Serialize;

use crate::io::recovery::RecoveryEntry;
use crate::model::{Database, DisplayConfig, FileContent, Node, NodeType};
use crate::ops::check::{CheckError, CheckResult, CheckWarning};
use crate::ops::search::{MatchField, SearchHit};
use crate::ops::tree_ops;
use crate::util::unicode::{preview, truncate_to_width};

/// Characters of an ID shown in listings.
const SHORT_ID_LEN: usize = 8;

/// Width of snippet previews in `show`.
const PREVIEW_WIDTH: usize = 60;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct NodeJson {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: &'static str,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    /// Shortcut whose target is gone
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub missing: bool,
}

#[derive(Serialize)]
pub struct TreeJson {
    #[serde(flatten)]
    pub node: NodeJson,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<TreeJson>,
}

#[derive(Serialize)]
pub struct FileJson {
    pub id: String,
    pub name: String,
    pub path: Vec<String>,
    pub locked: bool,
    pub autosave: bool,
    pub last_saved: Option<String>,
    pub favorite: bool,
    pub read_text: String,
    pub snippets: Vec<String>,
}

pub fn node_to_json(db: &Database, node: &Node) -> NodeJson {
    NodeJson {
        id: node.id.clone(),
        node_type: node.node_type().as_str(),
        name: node.name.clone(),
        children: node.is_folder().then(|| node.children().len()),
        target_id: node.target_id().map(str::to_string),
        missing: is_missing(db, node),
    }
}

pub fn tree_to_json(db: &Database, root_id: &str) -> Option<TreeJson> {
    let mut seen = HashSet::new();
    tree_json_inner(db, root_id, &mut seen)
}

fn tree_json_inner(db: &Database, id: &str, seen: &mut HashSet<String>) -> Option<TreeJson> {
    let node = db.get(id)?;
    if !seen.insert(node.id.clone()) {
        return None;
    }
    let items = tree_ops::sorted_children(db, id)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|child| tree_json_inner(db, &child.id, seen))
        .collect();
    Some(TreeJson {
        node: node_to_json(db, node),
        items,
    })
}

pub fn file_to_json(db: &Database, node: &Node, content: &FileContent) -> FileJson {
    FileJson {
        id: node.id.clone(),
        name: node.name.clone(),
        path: tree_ops::path_names(db, &node.id),
        locked: content.meta.locked,
        autosave: content.meta.autosave,
        last_saved: content.meta.last_saved.clone(),
        favorite: crate::ops::favorites::is_favorited(db, &node.id),
        read_text: content.read_doc.text.clone(),
        snippets: content.copy_docs().iter().map(|d| d.text.clone()).collect(),
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

fn is_missing(db: &Database, node: &Node) -> bool {
    node.node_type() == NodeType::Shortcut
        && !node
            .target_id()
            .and_then(|t| db.get(t))
            .is_some_and(Node::is_file)
}

pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((i, _)) => &id[..i],
        None => id,
    }
}

/// One listing line: `[4f2c1a9e] Deeds/`, `Grant`, `-> Grant`,
/// `-> Grant (missing)`.
pub fn format_node_line(db: &Database, node: &Node, display: &DisplayConfig) -> String {
    let name = truncate_to_width(&node.name, display.max_name_width);
    let label = match node.node_type() {
        NodeType::Folder => format!("{}/", name),
        NodeType::File => name,
        NodeType::Shortcut if is_missing(db, node) => format!("-> {} (missing)", name),
        NodeType::Shortcut => format!("-> {}", name),
    };
    if display.show_ids {
        format!("[{}] {}", short_id(&node.id), label)
    } else {
        label
    }
}

/// Box-drawn tree below `root_id`, children in display order.
pub fn render_tree(db: &Database, root_id: &str, display: &DisplayConfig) -> String {
    let mut out = String::new();
    let Some(root) = db.get(root_id) else {
        return out;
    };
    out.push_str(&format_node_line(db, root, display));
    out.push('\n');
    let mut seen = HashSet::from([root.id.clone()]);
    render_children(db, root_id, "", display, &mut seen, &mut out);
    out
}

fn render_children(
    db: &Database,
    folder_id: &str,
    prefix: &str,
    display: &DisplayConfig,
    seen: &mut HashSet<String>,
    out: &mut String,
) {
    let children = tree_ops::sorted_children(db, folder_id).unwrap_or_default();
    let count = children.len();
    for (i, child) in children.into_iter().enumerate() {
        let last = i + 1 == count;
        let (branch, indent) = if last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        out.push_str(prefix);
        out.push_str(branch);
        out.push_str(&format_node_line(db, child, display));
        out.push('\n');
        if child.is_folder() && seen.insert(child.id.clone()) {
            let deeper = format!("{}{}", prefix, indent);
            render_children(db, &child.id, &deeper, display, seen, out);
        }
    }
}

/// `show` output: path, settings, read text, numbered snippets.
pub fn render_file(db: &Database, node: &Node, content: &FileContent) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}  [{}]\n", tree_ops::path_names(db, &node.id).join(" / "), node.id));
    let mut flags = Vec::new();
    if content.meta.locked {
        flags.push("locked");
    }
    if content.meta.autosave {
        flags.push("autosave");
    }
    if crate::ops::favorites::is_favorited(db, &node.id) {
        flags.push("favorite");
    }
    if !flags.is_empty() {
        out.push_str(&format!("{}\n", flags.join(", ")));
    }
    out.push_str(&format!("last saved: {}\n", content.meta.last_saved_label()));

    out.push_str("\nread:\n");
    for line in content.read_doc.text.lines() {
        out.push_str(&format!("  {}\n", line));
    }

    out.push_str("\nsnippets:\n");
    for (i, doc) in content.copy_docs().iter().enumerate() {
        let text = preview(&doc.text, PREVIEW_WIDTH);
        if text.is_empty() {
            out.push_str(&format!("  {}. (empty)\n", i + 1));
        } else {
            out.push_str(&format!("  {}. {}\n", i + 1, text));
        }
    }
    out
}

pub fn format_search_hit(db: &Database, hit: &SearchHit, display: &DisplayConfig) -> String {
    let Some(node) = db.get(&hit.node_id) else {
        return hit.name.clone();
    };
    let line = format_node_line(db, node, display);
    match hit.field {
        MatchField::Name => line,
        MatchField::ReadText => format!("{}  (read text)", line),
        MatchField::Snippet(i) => format!("{}  (snippet {})", line, i + 1),
    }
}

pub fn render_check(result: &CheckResult) -> String {
    let mut out = String::new();
    if !result.errors.is_empty() {
        out.push_str("Errors:\n");
        for err in &result.errors {
            let line = match err {
                CheckError::MissingRoot { root, node_id } => {
                    format!("{} root {} is missing or not a folder", root, node_id)
                }
                CheckError::DanglingChild { folder_id, child_id } => {
                    format!("folder {} lists missing node {}", folder_id, child_id)
                }
                CheckError::MultipleParents { node_id, parent_ids } => {
                    format!("{} has several parents: {}", node_id, parent_ids.join(", "))
                }
                CheckError::Cycle { node_id } => format!("folder {} contains itself", node_id),
                CheckError::Orphan { node_id, name } => {
                    format!("{} \"{}\" is in no folder", node_id, name)
                }
            };
            out.push_str(&format!("  {}\n", line));
        }
    }
    if !result.warnings.is_empty() {
        if !result.errors.is_empty() {
            out.push('\n');
        }
        out.push_str("Warnings:\n");
        for warn in &result.warnings {
            let line = match warn {
                CheckWarning::DanglingShortcut { shortcut_id, target_id } => format!(
                    "shortcut {} points at missing file {}",
                    shortcut_id,
                    target_id.as_deref().unwrap_or("(none)")
                ),
                CheckWarning::DuplicateFavorite { target_id, shortcut_ids } => {
                    format!("{} has several favorites: {}", target_id, shortcut_ids.join(", "))
                }
                CheckWarning::NonShortcutFavorite { node_id } => {
                    format!("{} in Favorites is not a shortcut", node_id)
                }
            };
            out.push_str(&format!("  {}\n", line));
        }
    }
    if result.valid && result.warnings.is_empty() {
        out.push_str("store is valid\n");
    }
    out
}

pub fn render_recovery_entry(entry: &RecoveryEntry) -> String {
    let mut out = format!(
        "{} {}: {}\n",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
        entry.category,
        entry.description
    );
    for (key, value) in &entry.fields {
        out.push_str(&format!("  {}: {}\n", key, value));
    }
    if !entry.body.is_empty() {
        let lines = entry.body.lines().count();
        out.push_str(&format!("  ({} line body)\n", lines));
    }
    out
}
