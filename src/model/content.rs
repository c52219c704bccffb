use chrono::{Local, NaiveDateTime};

use super::rich::RichDocument;

/// Reserved `read_doc` keys holding file-level settings.
pub const LOCK_KEY: &str = "_locked";
pub const AUTOSAVE_KEY: &str = "_autosave";
pub const LAST_SAVED_KEY: &str = "_last_saved_ts";

/// Timestamp layout of `_last_saved_ts` (local time, seconds precision).
pub const LAST_SAVED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// File-level settings persisted alongside the read document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMeta {
    pub locked: bool,
    pub autosave: bool,
    /// ISO-8601 text as stored; kept verbatim so foreign timestamps survive.
    pub last_saved: Option<String>,
}

impl FileMeta {
    /// Stamp `last_saved` with the given local time.
    pub fn stamp(&mut self, at: NaiveDateTime) {
        self.last_saved = Some(at.format(LAST_SAVED_FORMAT).to_string());
    }

    pub fn stamp_now(&mut self) {
        self.stamp(Local::now().naive_local());
    }

    /// Human-readable "last saved" label, e.g. `3/7/2025 4:05 PM`.
    pub fn last_saved_label(&self) -> String {
        match &self.last_saved {
            None => "Never".to_string(),
            Some(ts) => match parse_timestamp(ts) {
                Some(dt) => dt.format("%-m/%-d/%Y %-I:%M %p").to_string(),
                None => ts.clone(),
            },
        }
    }
}

fn parse_timestamp(ts: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(ts, LAST_SAVED_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

/// Errors from operations on a file's snippet list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error("a file must keep at least one copy section")]
    LastSnippet,
    #[error("copy section {index} does not exist (file has {len})")]
    OutOfRange { index: usize, len: usize },
}

/// The payload of a file node: one read-only document and a non-empty list
/// of copyable snippets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub read_doc: RichDocument,
    copy_docs: Vec<RichDocument>,
    pub meta: FileMeta,
}

impl Default for FileContent {
    fn default() -> Self {
        FileContent::new()
    }
}

impl FileContent {
    /// Empty read document and a single empty snippet.
    pub fn new() -> Self {
        FileContent {
            read_doc: RichDocument::blank(),
            copy_docs: vec![RichDocument::blank()],
            meta: FileMeta::default(),
        }
    }

    /// Build content from parts. An empty snippet list becomes one blank
    /// snippet.
    pub fn from_parts(read_doc: RichDocument, copy_docs: Vec<RichDocument>, meta: FileMeta) -> Self {
        let copy_docs = if copy_docs.is_empty() {
            vec![RichDocument::blank()]
        } else {
            copy_docs
        };
        FileContent {
            read_doc,
            copy_docs,
            meta,
        }
    }

    pub fn copy_docs(&self) -> &[RichDocument] {
        &self.copy_docs
    }

    pub fn copy_doc(&self, index: usize) -> Result<&RichDocument, ContentError> {
        let len = self.copy_docs.len();
        self.copy_docs
            .get(index)
            .ok_or(ContentError::OutOfRange { index, len })
    }

    pub fn copy_doc_mut(&mut self, index: usize) -> Result<&mut RichDocument, ContentError> {
        let len = self.copy_docs.len();
        self.copy_docs
            .get_mut(index)
            .ok_or(ContentError::OutOfRange { index, len })
    }

    /// Append a snippet, returning its index.
    pub fn push_copy_doc(&mut self, doc: RichDocument) -> usize {
        self.copy_docs.push(doc);
        self.copy_docs.len() - 1
    }

    /// Remove a snippet. Removing the last remaining one is rejected.
    pub fn remove_copy_doc(&mut self, index: usize) -> Result<RichDocument, ContentError> {
        let len = self.copy_docs.len();
        if len <= 1 {
            return Err(ContentError::LastSnippet);
        }
        if index >= len {
            return Err(ContentError::OutOfRange { index, len });
        }
        Ok(self.copy_docs.remove(index))
    }

    pub fn swap_copy_docs(&mut self, a: usize, b: usize) -> Result<(), ContentError> {
        let len = self.copy_docs.len();
        for index in [a, b] {
            if index >= len {
                return Err(ContentError::OutOfRange { index, len });
            }
        }
        self.copy_docs.swap(a, b);
        Ok(())
    }
}
