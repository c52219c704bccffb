use crate::model::{FileContent, RichDocument, TagSpan};

/// A tag reduced to comparable strings: name, sorted options, ranges.
type FrozenTag = (String, Vec<(String, String)>, Vec<(String, String)>);

/// Normalized snapshot of a file's content and settings. Two contents with
/// equal signatures save to the same JSON; a draft is dirty when its
/// signature differs from the one taken at the last save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    locked: bool,
    autosave: bool,
    last_saved: Option<String>,
    read: (String, Vec<FrozenTag>),
    copies: Vec<(String, Vec<FrozenTag>)>,
}

impl Signature {
    pub fn of(content: &FileContent) -> Self {
        Signature {
            locked: content.meta.locked,
            autosave: content.meta.autosave,
            last_saved: content.meta.last_saved.clone(),
            read: freeze_doc(&content.read_doc),
            copies: content.copy_docs().iter().map(freeze_doc).collect(),
        }
    }
}

fn freeze_doc(doc: &RichDocument) -> (String, Vec<FrozenTag>) {
    (doc.text.clone(), doc.tags.iter().map(freeze_tag).collect())
}

fn freeze_tag(tag: &TagSpan) -> FrozenTag {
    (
        tag.name.clone(),
        tag.config.option_pairs(),
        tag.ranges
            .iter()
            .map(|r| (r.start().to_string(), r.end().to_string()))
            .collect(),
    )
}
