use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use super::font::FontDescriptor;

/// A position in a document's text: 1-based line, 0-based character column.
///
/// Persisted as the `"line.column"` string form used by text widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextIndex {
    pub line: usize,
    pub col: usize,
}

impl TextIndex {
    pub fn new(line: usize, col: usize) -> Self {
        TextIndex { line, col }
    }

    /// The first position of any document (`1.0`).
    pub fn start() -> Self {
        TextIndex { line: 1, col: 0 }
    }
}

impl fmt::Display for TextIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid text index: {0:?}")]
pub struct TextIndexError(pub String);

impl FromStr for TextIndex {
    type Err = TextIndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TextIndexError(s.to_string());
        let (line, col) = s.trim().split_once('.').ok_or_else(err)?;
        let line: usize = line.parse().map_err(|_| err())?;
        let col: usize = col.parse().map_err(|_| err())?;
        if line == 0 {
            return Err(err());
        }
        Ok(TextIndex { line, col })
    }
}

impl Serialize for TextIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A half-open `[start, end)` range covered by a tag. Serialized as a
/// two-element array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TagRange(pub TextIndex, pub TextIndex);

impl TagRange {
    pub fn start(&self) -> TextIndex {
        self.0
    }

    pub fn end(&self) -> TextIndex {
        self.1
    }
}

/// Style options a tag can carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<FontDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreground: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub underline: bool,
}

impl TagConfig {
    pub fn is_empty(&self) -> bool {
        self.font.is_none() && self.foreground.is_none() && !self.underline
    }

    /// Flatten into `(option, value)` string pairs, sorted by option name.
    pub fn option_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(font) = &self.font {
            pairs.push(("font".to_string(), font.to_string()));
        }
        if let Some(fg) = &self.foreground {
            pairs.push(("foreground".to_string(), fg.clone()));
        }
        if self.underline {
            pairs.push(("underline".to_string(), "1".to_string()));
        }
        pairs.sort();
        pairs
    }
}

/// One named style applied over a set of ranges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagSpan {
    pub name: String,
    pub ranges: Vec<TagRange>,
    pub config: TagConfig,
}

/// Plain text plus the named style tags laid over it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RichDocument {
    pub text: String,
    pub tags: Vec<TagSpan>,
}

impl RichDocument {
    pub fn blank() -> Self {
        RichDocument::default()
    }

    /// A document with the given text and no formatting.
    pub fn plain(text: impl Into<String>) -> Self {
        RichDocument {
            text: text.into(),
            tags: Vec::new(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.is_empty() && self.tags.is_empty()
    }

    /// Swap in new text, keeping the tag ranges that still lie inside it.
    /// Tags left with no ranges are dropped.
    pub fn replace_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        let line_lens: Vec<usize> = self.text.split('\n').map(|l| l.chars().count()).collect();
        let fits = |idx: TextIndex| {
            idx.line
                .checked_sub(1)
                .and_then(|i| line_lens.get(i))
                .is_some_and(|len| idx.col <= *len)
        };
        for span in &mut self.tags {
            span.ranges
                .retain(|r| r.start() < r.end() && fits(r.start()) && fits(r.end()));
        }
        self.tags.retain(|span| !span.ranges.is_empty());
    }
}
