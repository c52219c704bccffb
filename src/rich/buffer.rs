use crate::model::{EditorConfig, FontDescriptor, RichDocument, TagConfig, TagRange, TagSpan, TextIndex};

/// Name of the transient selection tag. Never extracted or persisted.
pub const SEL: &str = "sel";
pub const BOLD: &str = "BOLD";
pub const UNDER: &str = "UNDER";

/// Error type for selection formatting
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("nothing is selected")]
    NoSelection,
    #[error("invalid colour {0:?}, expected #rrggbb")]
    InvalidColor(String),
    #[error("invalid font size {0}")]
    InvalidSize(i32),
    #[error("font family cannot be empty")]
    EmptyFamily,
}

/// A formatting action applied to the current selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOp {
    Bold,
    Underline,
    Family(String),
    Size(i32),
    Color(String),
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Tag {
    name: String,
    config: TagConfig,
    /// Sorted, disjoint, non-adjacent `[start, end)` character offsets
    ranges: Vec<(usize, usize)>,
}

/// Plain text with named, ranged style tags and a selection.
///
/// Offsets count characters. Like a text widget, the buffer ends with an
/// implicit newline, so the last valid offset is one past the text and its
/// index is the start of the line after the last.
#[derive(Debug, Clone)]
pub struct StyledBuffer {
    text: String,
    /// Lowest priority first
    tags: Vec<Tag>,
    selection: Option<(usize, usize)>,
    base_font: FontDescriptor,
}

impl StyledBuffer {
    pub fn new(base_font: FontDescriptor) -> Self {
        StyledBuffer {
            text: String::new(),
            tags: Vec::new(),
            selection: None,
            base_font,
        }
    }

    pub fn from_editor(editor: &EditorConfig) -> Self {
        StyledBuffer::new(FontDescriptor::new(
            editor.font_family.clone(),
            Some(editor.font_size),
        ))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    fn end_offset(&self) -> usize {
        self.text.chars().count() + 1
    }

    // -----------------------------------------------------------------------
    // Indices
    // -----------------------------------------------------------------------

    /// Resolve a `line.column` index. Columns past the end of a line clamp
    /// to the line end; any index on the line after the last is the buffer
    /// end. Lines further out do not resolve.
    pub fn offset_of(&self, index: TextIndex) -> Option<usize> {
        let mut offset = 0;
        let mut line_count = 0;
        for (i, line) in self.text.split('\n').enumerate() {
            let len = line.chars().count();
            if i + 1 == index.line {
                return Some(offset + index.col.min(len));
            }
            offset += len + 1;
            line_count = i + 1;
        }
        (index.line == line_count + 1).then_some(offset)
    }

    /// The `line.column` index of a character offset (clamped to the end).
    pub fn index_of(&self, offset: usize) -> TextIndex {
        let mut remaining = offset.min(self.end_offset());
        for (i, line) in self.text.split('\n').enumerate() {
            let len = line.chars().count();
            if remaining <= len {
                return TextIndex::new(i + 1, remaining);
            }
            remaining -= len + 1;
        }
        TextIndex::new(self.text.split('\n').count() + 1, 0)
    }

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    fn tag(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name == name)
    }

    fn tag_mut(&mut self, name: &str) -> Option<&mut Tag> {
        self.tags.iter_mut().find(|t| t.name == name)
    }

    /// Create a tag at the highest priority, or replace an existing tag's
    /// config without changing its priority.
    pub fn tag_configure(&mut self, name: &str, config: TagConfig) {
        match self.tag_mut(name) {
            Some(tag) => tag.config = config,
            None => self.tags.push(Tag {
                name: name.to_string(),
                config,
                ranges: Vec::new(),
            }),
        }
    }

    /// Add `[start, end)` to a tag, creating it with an empty config if
    /// needed. Overlapping and touching ranges merge. Empty ranges are
    /// ignored.
    pub fn tag_add(&mut self, name: &str, start: usize, end: usize) {
        let end = end.min(self.end_offset());
        if start >= end {
            return;
        }
        if self.tag(name).is_none() {
            self.tag_configure(name, TagConfig::default());
        }
        let Some(tag) = self.tag_mut(name) else {
            return;
        };

        let (mut lo, mut hi) = (start, end);
        let mut merged = Vec::with_capacity(tag.ranges.len() + 1);
        for &(s, e) in &tag.ranges {
            if e < lo || s > hi {
                merged.push((s, e));
            } else {
                lo = lo.min(s);
                hi = hi.max(e);
            }
        }
        merged.push((lo, hi));
        merged.sort_unstable();
        tag.ranges = merged;
    }

    /// Remove `[start, end)` from a tag's ranges, splitting where needed.
    pub fn tag_remove(&mut self, name: &str, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let Some(tag) = self.tag_mut(name) else {
            return;
        };
        let mut kept = Vec::with_capacity(tag.ranges.len() + 1);
        for &(s, e) in &tag.ranges {
            if e <= start || s >= end {
                kept.push((s, e));
                continue;
            }
            if s < start {
                kept.push((s, start));
            }
            if e > end {
                kept.push((end, e));
            }
        }
        tag.ranges = kept;
    }

    /// Ranges of a tag as indices, in order.
    pub fn tag_ranges(&self, name: &str) -> Vec<TagRange> {
        self.tag(name)
            .map(|t| {
                t.ranges
                    .iter()
                    .map(|&(s, e)| TagRange(self.index_of(s), self.index_of(e)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Tags covering the character at `offset`, lowest priority first.
    pub fn tag_names_at(&self, offset: usize) -> Vec<&str> {
        self.tags
            .iter()
            .filter(|t| t.ranges.iter().any(|&(s, e)| s <= offset && offset < e))
            .map(|t| t.name.as_str())
            .collect()
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    /// Capture text and tags. Tags without ranges are left out.
    pub fn extract(&self) -> RichDocument {
        let tags = self
            .tags
            .iter()
            .filter(|t| !t.ranges.is_empty())
            .map(|t| TagSpan {
                name: t.name.clone(),
                ranges: self.tag_ranges(&t.name),
                config: t.config.clone(),
            })
            .collect();
        RichDocument {
            text: self.text.clone(),
            tags,
        }
    }

    /// Replace the buffer's text and tags with a document. Tags are created
    /// in listed order; a repeated name reuses the first tag and takes the
    /// later config. Returns the number of ranges that could not be placed.
    pub fn apply(&mut self, doc: &RichDocument) -> usize {
        self.text = doc.text.clone();
        self.tags.clear();
        self.selection = None;

        let mut skipped = 0;
        for span in &doc.tags {
            if span.name.is_empty() || span.name == SEL {
                continue;
            }
            self.tag_configure(&span.name, span.config.clone());
            for range in &span.ranges {
                match (self.offset_of(range.start()), self.offset_of(range.end())) {
                    (Some(s), Some(e)) if s < e => self.tag_add(&span.name, s, e),
                    (Some(s), Some(e)) if s == e => {}
                    _ => skipped += 1,
                }
            }
        }
        if skipped > 0 {
            tracing::debug!(skipped, "ranges outside the document were not applied");
        }
        skipped
    }

    // -----------------------------------------------------------------------
    // Selection formatting
    // -----------------------------------------------------------------------

    /// Select `[start, end)`. An empty or unresolvable range clears the
    /// selection and returns false.
    pub fn select(&mut self, start: TextIndex, end: TextIndex) -> bool {
        self.selection = match (self.offset_of(start), self.offset_of(end)) {
            (Some(s), Some(e)) if s < e => Some((s, e)),
            _ => None,
        };
        self.selection.is_some()
    }

    pub fn selection(&self) -> Option<TagRange> {
        self.selection
            .map(|(s, e)| TagRange(self.index_of(s), self.index_of(e)))
    }

    /// Configure `BOLD` and `UNDER` from the base font unless the document
    /// already defined them.
    pub fn ensure_base_tags(&mut self) {
        if self.tag(BOLD).is_none() {
            let config = TagConfig {
                font: Some(self.base_font.bolded()),
                ..Default::default()
            };
            self.tag_configure(BOLD, config);
        }
        if self.tag(UNDER).is_none() {
            let config = TagConfig {
                underline: true,
                ..Default::default()
            };
            self.tag_configure(UNDER, config);
        }
    }

    fn require_selection(&self) -> Result<(usize, usize), FormatError> {
        self.selection.ok_or(FormatError::NoSelection)
    }

    pub fn format_selection(&mut self, op: &FormatOp) -> Result<(), FormatError> {
        match op {
            FormatOp::Bold => self.toggle_on_selection(BOLD),
            FormatOp::Underline => self.toggle_on_selection(UNDER),
            FormatOp::Family(family) => self.set_family_on_selection(family),
            FormatOp::Size(size) => self.set_size_on_selection(*size),
            FormatOp::Color(color) => self.set_color_on_selection(color),
            FormatOp::Clear => self.clear_formatting_on_selection(),
        }
    }

    /// Remove the tag from the selection if the first selected character
    /// has it, else add it.
    pub fn toggle_on_selection(&mut self, name: &str) -> Result<(), FormatError> {
        let (start, end) = self.require_selection()?;
        self.ensure_base_tags();
        if self.tag_names_at(start).contains(&name) {
            self.tag_remove(name, start, end);
        } else {
            self.tag_add(name, start, end);
        }
        Ok(())
    }

    pub fn set_family_on_selection(&mut self, family: &str) -> Result<(), FormatError> {
        let (start, end) = self.require_selection()?;
        let family = family.trim();
        if family.is_empty() {
            return Err(FormatError::EmptyFamily);
        }
        let name = format!("FONT_{}", family);
        let config = TagConfig {
            font: Some(self.base_font.with_family(family)),
            ..Default::default()
        };
        self.tag_configure(&name, config);
        self.tag_add(&name, start, end);
        Ok(())
    }

    pub fn set_size_on_selection(&mut self, size: i32) -> Result<(), FormatError> {
        let (start, end) = self.require_selection()?;
        if size <= 0 {
            return Err(FormatError::InvalidSize(size));
        }
        let name = format!("SIZE_{}", size);
        let config = TagConfig {
            font: Some(self.base_font.with_size(size)),
            ..Default::default()
        };
        self.tag_configure(&name, config);
        self.tag_add(&name, start, end);
        Ok(())
    }

    /// `color` is `#rrggbb`; the leading `#` is optional.
    pub fn set_color_on_selection(&mut self, color: &str) -> Result<(), FormatError> {
        let (start, end) = self.require_selection()?;
        let hex = color.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(FormatError::InvalidColor(color.to_string()));
        }
        let name = format!("COLOR_{}", hex);
        let config = TagConfig {
            foreground: Some(format!("#{}", hex)),
            ..Default::default()
        };
        self.tag_configure(&name, config);
        self.tag_add(&name, start, end);
        Ok(())
    }

    /// Strip every tag from the selected text.
    pub fn clear_formatting_on_selection(&mut self) -> Result<(), FormatError> {
        let (start, end) = self.require_selection()?;
        let names: Vec<String> = self.tags.iter().map(|t| t.name.clone()).collect();
        for name in names {
            self.tag_remove(&name, start, end);
        }
        Ok(())
    }
}

/// Apply one formatting action to `[start, end)` of a document.
pub fn format_document(
    doc: &RichDocument,
    editor: &EditorConfig,
    start: TextIndex,
    end: TextIndex,
    op: &FormatOp,
) -> Result<RichDocument, FormatError> {
    let mut buffer = StyledBuffer::from_editor(editor);
    buffer.apply(doc);
    if !buffer.select(start, end) {
        return Err(FormatError::NoSelection);
    }
    buffer.format_selection(op)?;
    Ok(buffer.extract())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn idx(s: &str) -> TextIndex {
        s.parse().unwrap()
    }

    fn buffer(text: &str) -> StyledBuffer {
        let mut b = StyledBuffer::from_editor(&EditorConfig::default());
        b.apply(&RichDocument::plain(text));
        b
    }

    fn range(a: &str, b: &str) -> TagRange {
        TagRange(idx(a), idx(b))
    }

    #[test]
    fn index_offset_conversion() {
        let b = buffer("ab\ncde");
        assert_eq!(b.offset_of(idx("1.0")), Some(0));
        assert_eq!(b.offset_of(idx("1.9")), Some(2));
        assert_eq!(b.offset_of(idx("2.1")), Some(4));
        assert_eq!(b.offset_of(idx("3.0")), Some(7));
        assert_eq!(b.offset_of(idx("4.0")), None);
        assert_eq!(b.index_of(4), idx("2.1"));
        assert_eq!(b.index_of(7), idx("3.0"));
        assert_eq!(b.index_of(99), idx("3.0"));
    }

    #[test]
    fn columns_count_characters() {
        let b = buffer("héllo");
        assert_eq!(b.offset_of(idx("1.2")), Some(2));
        assert_eq!(b.index_of(5), idx("1.5"));
    }

    #[test]
    fn tag_add_merges_and_remove_splits() {
        let mut b = buffer("0123456789");
        b.tag_add("X", 0, 3);
        b.tag_add("X", 5, 7);
        b.tag_add("X", 3, 4);
        assert_eq!(b.tag_ranges("X"), vec![range("1.0", "1.4"), range("1.5", "1.7")]);
        b.tag_remove("X", 1, 6);
        assert_eq!(b.tag_ranges("X"), vec![range("1.0", "1.1"), range("1.6", "1.7")]);
    }

    #[test]
    fn extract_apply_round_trip() {
        let doc = RichDocument {
            text: "Hello\nworld".into(),
            tags: vec![
                TagSpan {
                    name: "COLOR_ff0000".into(),
                    ranges: vec![range("1.0", "1.5"), range("2.0", "2.2")],
                    config: TagConfig {
                        foreground: Some("#ff0000".into()),
                        ..Default::default()
                    },
                },
                TagSpan {
                    name: "UNDER".into(),
                    ranges: vec![range("2.0", "3.0")],
                    config: TagConfig {
                        underline: true,
                        ..Default::default()
                    },
                },
            ],
        };
        let mut b = buffer("");
        assert_eq!(b.apply(&doc), 0);
        assert_eq!(b.extract(), doc);
    }

    #[test]
    fn apply_skips_bad_ranges_individually() {
        let doc = RichDocument {
            text: "abc".into(),
            tags: vec![TagSpan {
                name: "BOLD".into(),
                ranges: vec![range("1.2", "1.1"), range("7.0", "8.0"), range("1.0", "1.1")],
                config: TagConfig::default(),
            }],
        };
        let mut b = buffer("");
        assert_eq!(b.apply(&doc), 2);
        assert_eq!(b.tag_ranges("BOLD"), vec![range("1.0", "1.1")]);
    }

    #[test]
    fn repeated_names_reuse_one_tag() {
        let span = |r: TagRange| TagSpan {
            name: "X".into(),
            ranges: vec![r],
            config: TagConfig::default(),
        };
        let doc = RichDocument {
            text: "abcdef".into(),
            tags: vec![span(range("1.0", "1.2")), span(range("1.4", "1.6"))],
        };
        let mut b = buffer("");
        b.apply(&doc);
        assert_eq!(b.tag_names(), vec!["X"]);
        assert_eq!(b.extract().tags.len(), 1);
        assert_eq!(b.extract().tags[0].ranges.len(), 2);
    }

    #[test]
    fn formatting_requires_selection() {
        let mut b = buffer("abc");
        assert_eq!(b.format_selection(&FormatOp::Bold), Err(FormatError::NoSelection));
        assert!(!b.select(idx("1.2"), idx("1.2")));
    }

    #[test]
    fn toggle_bold() {
        let mut b = buffer("bold text");
        b.select(idx("1.0"), idx("1.4"));
        b.format_selection(&FormatOp::Bold).unwrap();
        let doc = b.extract();
        assert_eq!(doc.tags.len(), 1);
        assert_eq!(doc.tags[0].name, "BOLD");
        assert_eq!(doc.tags[0].config.font.as_ref().unwrap().to_string(), "{Segoe UI} 11 bold");

        b.format_selection(&FormatOp::Bold).unwrap();
        assert!(b.extract().tags.is_empty());
    }

    #[test]
    fn dynamic_tags_are_named_after_their_value() {
        let mut b = buffer("styled");
        b.select(idx("1.0"), idx("1.6"));
        b.format_selection(&FormatOp::Family("Consolas".into())).unwrap();
        b.format_selection(&FormatOp::Size(14)).unwrap();
        b.format_selection(&FormatOp::Color("#1A2b3C".into())).unwrap();
        let doc = b.extract();
        let names: Vec<&str> = doc.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["FONT_Consolas", "SIZE_14", "COLOR_1A2b3C"]);
        assert_eq!(doc.tags[0].config.font.as_ref().unwrap().to_string(), "Consolas 11");
        assert_eq!(doc.tags[1].config.font.as_ref().unwrap().to_string(), "{Segoe UI} 14");
        assert_eq!(doc.tags[2].config.foreground.as_deref(), Some("#1A2b3C"));

        assert_eq!(
            b.format_selection(&FormatOp::Color("red".into())),
            Err(FormatError::InvalidColor("red".into()))
        );
        assert_eq!(b.format_selection(&FormatOp::Size(0)), Err(FormatError::InvalidSize(0)));
    }

    #[test]
    fn clear_formatting_only_touches_selection() {
        let mut b = buffer("abcdef");
        b.tag_add("X", 0, 6);
        b.tag_add("Y", 2, 4);
        b.select(idx("1.1"), idx("1.5"));
        b.format_selection(&FormatOp::Clear).unwrap();
        assert_eq!(b.tag_ranges("X"), vec![range("1.0", "1.1"), range("1.5", "1.6")]);
        assert!(b.tag_ranges("Y").is_empty());
    }

    #[test]
    fn format_document_helper() {
        let doc = RichDocument::plain("underline me");
        let out = format_document(
            &doc,
            &EditorConfig::default(),
            idx("1.0"),
            idx("1.9"),
            &FormatOp::Underline,
        )
        .unwrap();
        assert_eq!(out.text, doc.text);
        assert_eq!(out.tags[0].name, "UNDER");
        assert!(out.tags[0].config.underline);
        assert_eq!(out.tags[0].ranges, vec![range("1.0", "1.9")]);
    }
}
