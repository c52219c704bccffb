use serde_json::{Map, Value, json};

use super::issues::IssueSink;
use crate::model::{
    AUTOSAVE_KEY, FileMeta, FontDescriptor, LAST_SAVED_KEY, LOCK_KEY, RichDocument, TagConfig,
    TagRange, TagSpan, TextIndex,
};

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

pub fn rich_doc_to_value(doc: &RichDocument) -> Value {
    let tags: Vec<Value> = doc.tags.iter().map(tag_to_value).collect();
    json!({
        "text": doc.text,
        "tags": tags,
    })
}

/// The read document with the reserved settings keys beside `text`/`tags`.
pub fn read_doc_to_value(doc: &RichDocument, meta: &FileMeta) -> Value {
    let mut value = rich_doc_to_value(doc);
    if let Value::Object(map) = &mut value {
        map.insert(LOCK_KEY.to_string(), Value::Bool(meta.locked));
        map.insert(AUTOSAVE_KEY.to_string(), Value::Bool(meta.autosave));
        map.insert(
            LAST_SAVED_KEY.to_string(),
            meta.last_saved.clone().map_or(Value::Null, Value::String),
        );
    }
    value
}

fn tag_to_value(tag: &TagSpan) -> Value {
    let ranges: Vec<Value> = tag
        .ranges
        .iter()
        .map(|r| json!([r.start().to_string(), r.end().to_string()]))
        .collect();
    let mut config = Map::new();
    if let Some(font) = &tag.config.font {
        config.insert("font".into(), Value::String(font.to_string()));
    }
    if let Some(fg) = &tag.config.foreground {
        config.insert("foreground".into(), Value::String(fg.clone()));
    }
    if tag.config.underline {
        config.insert("underline".into(), Value::Bool(true));
    }
    json!({
        "name": tag.name,
        "ranges": ranges,
        "config": config,
    })
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Parse a rich document leniently. A bare string becomes a plain document;
/// anything else that is not an object becomes a blank one.
pub fn parse_rich_doc(value: &Value, location: &str, sink: &mut IssueSink) -> RichDocument {
    match value {
        Value::String(s) => RichDocument::plain(s.clone()),
        Value::Object(map) => parse_rich_map(map, location, sink),
        Value::Null => RichDocument::blank(),
        other => {
            sink.push(location, format!("expected a document, found {}", kind_of(other)));
            RichDocument::blank()
        }
    }
}

/// Parse the read document and pull out the reserved settings keys.
pub fn parse_read_doc(value: &Value, location: &str, sink: &mut IssueSink) -> (RichDocument, FileMeta) {
    let doc = parse_rich_doc(value, location, sink);
    let meta = match value {
        Value::Object(map) => FileMeta {
            locked: map.get(LOCK_KEY).is_some_and(truthy),
            autosave: map.get(AUTOSAVE_KEY).is_some_and(truthy),
            last_saved: map
                .get(LAST_SAVED_KEY)
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        _ => FileMeta::default(),
    };
    (doc, meta)
}

fn parse_rich_map(map: &Map<String, Value>, location: &str, sink: &mut IssueSink) -> RichDocument {
    let text = map
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut tags = Vec::new();
    match map.get("tags") {
        None | Some(Value::Null) => {}
        Some(Value::Array(raw_tags)) => {
            for raw in raw_tags {
                if let Some(tag) = parse_tag(raw, location, sink) {
                    tags.push(tag);
                }
            }
        }
        Some(other) => sink.push(location, format!("tags is {}, ignoring", kind_of(other))),
    }

    RichDocument { text, tags }
}

fn parse_tag(raw: &Value, location: &str, sink: &mut IssueSink) -> Option<TagSpan> {
    let Some(map) = raw.as_object() else {
        sink.push(location, "skipped a tag that is not an object");
        return None;
    };
    let name = match map.get("name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            sink.push(location, "skipped a tag without a name");
            return None;
        }
    };
    let tag_location = format!("{} tag {}", location, name);

    let mut ranges = Vec::new();
    if let Some(raw_ranges) = map.get("ranges").and_then(Value::as_array) {
        for raw_range in raw_ranges {
            match parse_range(raw_range) {
                Some(range) => ranges.push(range),
                None => sink.push(&tag_location, format!("skipped malformed range {}", raw_range)),
            }
        }
    }

    let config = match map.get("config") {
        Some(Value::Object(cfg)) => parse_config(cfg, &tag_location, sink),
        _ => TagConfig::default(),
    };

    Some(TagSpan {
        name,
        ranges,
        config,
    })
}

fn parse_range(raw: &Value) -> Option<TagRange> {
    let pair = raw.as_array()?;
    if pair.len() != 2 {
        return None;
    }
    let start = parse_index(&pair[0])?;
    let end = parse_index(&pair[1])?;
    Some(TagRange(start, end))
}

fn parse_index(raw: &Value) -> Option<TextIndex> {
    match raw {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

fn parse_config(cfg: &Map<String, Value>, location: &str, sink: &mut IssueSink) -> TagConfig {
    let mut config = TagConfig::default();

    if let Some(raw_font) = cfg.get("font") {
        match raw_font.as_str().map(str::parse::<FontDescriptor>) {
            Some(Ok(font)) => config.font = Some(font),
            Some(Err(e)) => sink.push(location, e.to_string()),
            None => sink.push(location, format!("font is {}, ignoring", kind_of(raw_font))),
        }
    }

    // Kept verbatim: colour names may contain spaces (`dark red`)
    match cfg.get("foreground") {
        None | Some(Value::Null) => {}
        Some(Value::String(fg)) => config.foreground = Some(fg.clone()),
        Some(other) => sink.push(location, format!("foreground is {}, ignoring", kind_of(other))),
    }

    config.underline = cfg.get("underline").is_some_and(truthy);
    config
}

/// `true`, non-zero numbers, and `"1"`/`"true"` strings.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(s.trim(), "1" | "true" | "True"),
        _ => false,
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: Value) -> (RichDocument, Vec<String>) {
        let mut sink = IssueSink::new();
        let doc = parse_rich_doc(&value, "doc", &mut sink);
        (doc, sink.into_vec().into_iter().map(|i| i.to_string()).collect())
    }

    #[test]
    fn parse_full_document() {
        let (doc, issues) = parse(json!({
            "text": "Hello world",
            "tags": [
                {"name": "BOLD", "ranges": [["1.0", "1.5"]], "config": {"font": "{Segoe UI} 11 bold"}},
                {"name": "COLOR_ff0000", "ranges": [["1.6", "1.11"]], "config": {"foreground": "#ff0000"}}
            ]
        }));
        assert!(issues.is_empty());
        assert_eq!(doc.text, "Hello world");
        assert_eq!(doc.tags.len(), 2);
        assert!(doc.tags[0].config.font.as_ref().unwrap().bold);
        assert_eq!(doc.tags[1].config.foreground.as_deref(), Some("#ff0000"));
        assert_eq!(doc.tags[1].ranges[0].end(), TextIndex::new(1, 11));
    }

    #[test]
    fn malformed_ranges_are_skipped_individually() {
        let (doc, issues) = parse(json!({
            "text": "abc",
            "tags": [{"name": "UNDER", "ranges": [["1.0"], ["1.0", "1.2"], "x", ["a", "1.1"]], "config": {"underline": 1}}]
        }));
        assert_eq!(doc.tags[0].ranges.len(), 1);
        assert!(doc.tags[0].config.underline);
        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn unparsable_font_is_dropped_but_tag_kept() {
        let (doc, issues) = parse(json!({
            "text": "abc",
            "tags": [{"name": "F", "ranges": [["1.0", "1.1"]], "config": {"font": "{broken", "underline": "1"}}]
        }));
        assert_eq!(doc.tags.len(), 1);
        assert!(doc.tags[0].config.font.is_none());
        assert!(doc.tags[0].config.underline);
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn nameless_tags_are_skipped() {
        let (doc, issues) = parse(json!({"text": "", "tags": [{"ranges": []}, 4]}));
        assert!(doc.tags.is_empty());
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn string_becomes_plain_document() {
        let (doc, issues) = parse(json!("just text"));
        assert_eq!(doc, RichDocument::plain("just text"));
        assert!(issues.is_empty());
    }

    #[test]
    fn read_doc_meta_round_trip() {
        let meta = FileMeta {
            locked: true,
            autosave: false,
            last_saved: Some("2025-01-02T03:04:05".into()),
        };
        let doc = RichDocument::plain("body");
        let value = read_doc_to_value(&doc, &meta);
        assert_eq!(value["_locked"], json!(true));
        assert_eq!(value["_last_saved_ts"], json!("2025-01-02T03:04:05"));

        let mut sink = IssueSink::new();
        let (parsed_doc, parsed_meta) = parse_read_doc(&value, "read_doc", &mut sink);
        assert_eq!(parsed_doc, doc);
        assert_eq!(parsed_meta, meta);
        assert!(sink.is_empty());
    }

    #[test]
    fn spaced_colour_names_and_empty_timestamps_survive() {
        let meta = FileMeta {
            locked: false,
            autosave: true,
            last_saved: Some(String::new()),
        };
        let doc = RichDocument {
            text: "warning".into(),
            tags: vec![TagSpan {
                name: "COLOR_dark_red".into(),
                ranges: vec![TagRange(TextIndex::new(1, 0), TextIndex::new(1, 7))],
                config: TagConfig {
                    foreground: Some("dark red".into()),
                    ..Default::default()
                },
            }],
        };
        let value = read_doc_to_value(&doc, &meta);

        let mut sink = IssueSink::new();
        let (parsed_doc, parsed_meta) = parse_read_doc(&value, "read_doc", &mut sink);
        assert!(sink.is_empty());
        assert_eq!(parsed_doc, doc);
        assert_eq!(parsed_meta, meta);
    }

    #[test]
    fn encoded_tag_matches_stored_shape() {
        let doc = RichDocument {
            text: "hi".into(),
            tags: vec![TagSpan {
                name: "SIZE_14".into(),
                ranges: vec![TagRange(TextIndex::new(1, 0), TextIndex::new(1, 2))],
                config: TagConfig {
                    font: Some(FontDescriptor::new("Segoe UI", Some(14))),
                    ..Default::default()
                },
            }],
        };
        assert_eq!(
            rich_doc_to_value(&doc),
            json!({
                "text": "hi",
                "tags": [{"name": "SIZE_14", "ranges": [["1.0", "1.2"]], "config": {"font": "{Segoe UI} 14"}}]
            })
        );
    }
}
