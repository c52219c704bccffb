use serde_json::{Map, Value, json};

use super::rich_codec::{read_doc_to_value, rich_doc_to_value};
use crate::model::{Database, FileContent, Node, NodeKind};

/// Serialize a database to the current on-disk shape.
///
/// Nodes are written in mapping order. Every node carries all six fields;
/// those that do not apply to its type are `[]` or `null`.
pub fn serialize_database(db: &Database) -> Value {
    let nodes: Map<String, Value> = db
        .nodes
        .iter()
        .map(|(id, node)| (id.clone(), node_to_value(node)))
        .collect();
    json!({
        "quickcopy_root_id": db.quickcopy_root_id,
        "favorites_root_id": db.favorites_root_id,
        "nodes": nodes,
    })
}

/// Pretty-printed JSON text for `data.json` (2-space indent, trailing newline).
pub fn serialize_database_pretty(db: &Database) -> Result<String, serde_json::Error> {
    let mut text = serde_json::to_string_pretty(&serialize_database(db))?;
    text.push('\n');
    Ok(text)
}

/// The raw node shape shared by the store and bundles.
pub fn node_to_value(node: &Node) -> Value {
    let (children, content, target_id) = match &node.kind {
        NodeKind::Folder { children } => (children.clone(), Value::Null, Value::Null),
        NodeKind::File { content } => (Vec::new(), content_to_value(content), Value::Null),
        NodeKind::Shortcut { target_id } => (
            Vec::new(),
            Value::Null,
            target_id.clone().map_or(Value::Null, Value::String),
        ),
    };
    json!({
        "id": node.id,
        "type": node.node_type().as_str(),
        "name": node.name,
        "children": children,
        "content": content,
        "target_id": target_id,
    })
}

pub fn content_to_value(content: &FileContent) -> Value {
    let copy_docs: Vec<Value> = content.copy_docs().iter().map(rich_doc_to_value).collect();
    json!({
        "read_doc": read_doc_to_value(&content.read_doc, &content.meta),
        "copy_docs": copy_docs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RichDocument;
    use crate::parse::db_parser::parse_database;
    use pretty_assertions::assert_eq;

    fn sample() -> Database {
        let mut db = Database::blank();
        let root = db.quickcopy_root_id.clone();
        let mut content = FileContent::new();
        content.read_doc = RichDocument::plain("terms");
        content.push_copy_doc(RichDocument::plain("second"));
        content.meta.locked = true;
        db.attach(&root, Node::folder("d".into(), "Deeds"));
        db.attach("d", Node::file("f".into(), "Grant", content));
        let fav = db.favorites_root_id.clone();
        db.attach(&fav, Node::shortcut("s".into(), "Grant", "f".into()));
        db
    }

    #[test]
    fn node_shapes() {
        let db = sample();
        assert_eq!(
            node_to_value(db.get("d").unwrap()),
            json!({"id": "d", "type": "folder", "name": "Deeds", "children": ["f"],
                   "content": null, "target_id": null})
        );
        let shortcut = node_to_value(db.get("s").unwrap());
        assert_eq!(shortcut["target_id"], json!("f"));
        assert_eq!(shortcut["children"], json!([]));

        let file = node_to_value(db.get("f").unwrap());
        assert_eq!(file["content"]["read_doc"]["text"], json!("terms"));
        assert_eq!(file["content"]["read_doc"]["_locked"], json!(true));
        assert_eq!(file["content"]["read_doc"]["_last_saved_ts"], json!(null));
        assert_eq!(file["content"]["copy_docs"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn serialize_then_parse_is_identity() {
        let db = sample();
        let (parsed, issues) = parse_database(&serialize_database(&db));
        assert!(issues.is_empty());
        assert_eq!(parsed, db);
    }

    #[test]
    fn pretty_output_uses_two_space_indent() {
        let text = serialize_database_pretty(&Database::blank()).unwrap();
        assert!(text.starts_with("{\n  \"quickcopy_root_id\""));
        assert!(text.ends_with("}\n"));
    }
}
