use std::ops::Range;

use regex::Regex;
use serde::Serialize;

use crate::model::{Database, Node, NodeId, NodeType};

/// Which field of a node matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    Name,
    /// Text of a file's read document
    ReadText,
    /// Text of the file's copy section at this index
    Snippet(usize),
}

/// A search hit on one field of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub node_id: NodeId,
    pub node_type: &'static str,
    pub name: String,
    pub field: MatchField,
    /// Byte ranges of the matches within the field
    #[serde(skip)]
    pub spans: Vec<Range<usize>>,
}

/// Build the matcher for a query. Plain queries are case-insensitive
/// substrings; `regex` queries are used as written.
pub fn build_pattern(query: &str, regex: bool) -> Result<Regex, regex::Error> {
    if regex {
        Regex::new(query)
    } else {
        Regex::new(&format!("(?i){}", regex::escape(query.trim())))
    }
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

/// Search every node's name and, with `content`, the text of every file.
/// Results are ordered folders first, then by case-insensitive name; hits on
/// the same node keep field order.
pub fn search_nodes(db: &Database, re: &Regex, content: bool) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    for node in db.nodes.values() {
        push_hit(&mut hits, node, MatchField::Name, re, &node.name);
        if !content {
            continue;
        }
        if let Some(file) = node.content() {
            push_hit(&mut hits, node, MatchField::ReadText, re, &file.read_doc.text);
            for (i, doc) in file.copy_docs().iter().enumerate() {
                push_hit(&mut hits, node, MatchField::Snippet(i), re, &doc.text);
            }
        }
    }

    hits.sort_by(|a, b| {
        let a_folder = a.node_type == NodeType::Folder.as_str();
        let b_folder = b.node_type == NodeType::Folder.as_str();
        b_folder
            .cmp(&a_folder)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    hits
}

fn push_hit(hits: &mut Vec<SearchHit>, node: &Node, field: MatchField, re: &Regex, text: &str) {
    let spans = find_matches(re, text);
    if spans.is_empty() {
        return;
    }
    hits.push(SearchHit {
        node_id: node.id.clone(),
        node_type: node.node_type().as_str(),
        name: node.name.clone(),
        field,
        spans,
    });
}
