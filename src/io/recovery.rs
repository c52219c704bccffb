//! Append-only markdown log of data the store could not keep: unsaved JSON
//! after a failed write, subtrees removed by deletes, entries the loader
//! skipped, and what imports brought in.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use super::lock::try_lock;
use crate::parse::LoadIssue;

pub const RECOVERY_FILE: &str = ".recovery.log";

/// Size above which old entries are trimmed on the next append (1 MB).
const MAX_LOG_SIZE: u64 = 1_048_576;

/// Entries older than this many days are prunable.
pub const PRUNE_AGE_DAYS: i64 = 30;

const FILE_HEADER: &str = "\
<!-- qc recovery log
     Data that could not be saved, and everything a delete removed.
     Bodies are JSON: a whole store, or a bundle for `qc import`.
     View with: qc recovery
     Prune entries older than 30 days: qc recovery prune -->

---
";

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryCategory {
    /// The loader skipped or repaired something
    Parser,
    /// A store write failed; the body is the unsaved store
    Write,
    /// A subtree was deleted; the body is a bundle of it
    Delete,
    /// A bundle or store was imported
    Import,
}

impl RecoveryCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryCategory::Parser => "parser",
            RecoveryCategory::Write => "write",
            RecoveryCategory::Delete => "delete",
            RecoveryCategory::Import => "import",
        }
    }
}

impl fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecoveryCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parser" => Ok(RecoveryCategory::Parser),
            "write" => Ok(RecoveryCategory::Write),
            "delete" => Ok(RecoveryCategory::Delete),
            "import" => Ok(RecoveryCategory::Import),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryEntry {
    pub timestamp: DateTime<Utc>,
    pub category: RecoveryCategory,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub body: String,
}

impl RecoveryEntry {
    pub fn new(category: RecoveryCategory, description: impl Into<String>) -> Self {
        RecoveryEntry {
            timestamp: Utc::now(),
            category,
            description: description.into(),
            fields: Vec::new(),
            body: String::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.fields.push((key.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// The markdown block appended to the log.
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "## {} {}: {}\n\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.category,
            self.description,
        );
        for (key, value) in &self.fields {
            out.push_str(&format!("{}: {}\n", key, value));
        }
        if !self.body.is_empty() {
            out.push_str("\n```json\n");
            out.push_str(&self.body);
            if !self.body.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }
        out.push_str("\n---\n");
        out
    }

    /// Shape used by `qc recovery --json`.
    pub fn to_json(&self) -> serde_json::Value {
        let fields: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            "category": self.category.as_str(),
            "description": self.description,
            "fields": fields,
            "body": self.body,
        })
    }
}

pub fn recovery_log_path(store_dir: &Path) -> PathBuf {
    store_dir.join(RECOVERY_FILE)
}

// ---------------------------------------------------------------------------
// Appending
// ---------------------------------------------------------------------------

/// Append an entry. Failures are logged and otherwise ignored: the log must
/// never be the reason an operation fails.
pub fn log_recovery(store_dir: &Path, entry: RecoveryEntry) {
    if let Err(e) = append_entry(store_dir, &entry) {
        tracing::warn!(error = %e, "could not write to recovery log");
    }
}

fn append_entry(store_dir: &Path, entry: &RecoveryEntry) -> io::Result<()> {
    let path = recovery_log_path(store_dir);
    let len = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    if len > MAX_LOG_SIZE {
        trim_old_entries(&path);
    }

    let needs_header = std::fs::metadata(&path).map_or(true, |m| m.len() == 0);
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if needs_header {
        file.write_all(FILE_HEADER.as_bytes())?;
    }
    file.write_all(entry.to_markdown().as_bytes())
}

/// Drop entries past the prune age, if nobody else holds the log.
fn trim_old_entries(path: &Path) {
    let Ok(file) = OpenOptions::new().read(true).write(true).open(path) else {
        return;
    };
    if try_lock(&file).is_err() {
        return;
    }
    let mut content = String::new();
    if io::BufReader::new(&file).read_to_string(&mut content).is_err() {
        return;
    }
    let cutoff = Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS);
    let trimmed = retain_entries_since(&content, &cutoff);
    if trimmed.len() < content.len()
        && let Ok(mut f) = File::create(path)
    {
        let _ = f.write_all(trimmed.as_bytes());
    }
}

/// A store write failed: keep the JSON that did not reach disk.
pub fn log_write_failure(store_dir: &Path, target: &Path, error: &io::Error, unsaved: &str) {
    log_recovery(
        store_dir,
        RecoveryEntry::new(RecoveryCategory::Write, "store could not be saved")
            .field("Path", target.display())
            .field("Error", error)
            .body(unsaved),
    );
}

/// A delete removed a subtree: keep it as a re-importable bundle.
pub fn log_deletion(store_dir: &Path, name: &str, node_id: &str, removed: usize, bundle: &str) {
    log_recovery(
        store_dir,
        RecoveryEntry::new(RecoveryCategory::Delete, format!("{:?} deleted", name))
            .field("Node", node_id)
            .field("Removed", removed)
            .body(bundle),
    );
}

/// The loader tolerated problems in the store.
pub fn log_load_issues(store_dir: &Path, source: &Path, issues: &[LoadIssue]) {
    if issues.is_empty() {
        return;
    }
    let body = issues
        .iter()
        .map(|i| serde_json::Value::String(i.to_string()))
        .collect::<Vec<_>>();
    let body = serde_json::to_string_pretty(&body).unwrap_or_default();
    log_recovery(
        store_dir,
        RecoveryEntry::new(
            RecoveryCategory::Parser,
            format!("{} problem(s) while loading", issues.len()),
        )
        .field("Source", source.display())
        .body(body),
    );
}

/// Something was imported. Lets an unwanted import be found and deleted.
pub fn log_import(store_dir: &Path, source: &Path, root_id: &str, imported: usize) {
    log_recovery(
        store_dir,
        RecoveryEntry::new(RecoveryCategory::Import, format!("imported {} node(s)", imported))
            .field("Source", source.display())
            .field("Root", root_id),
    );
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Entries newest first, at most `limit` of them.
pub fn read_recovery_entries(store_dir: &Path, limit: Option<usize>) -> Vec<RecoveryEntry> {
    let Ok(content) = std::fs::read_to_string(recovery_log_path(store_dir)) else {
        return Vec::new();
    };
    let mut entries = parse_entries(&content);
    entries.reverse();
    if let Some(n) = limit {
        entries.truncate(n);
    }
    entries
}

fn parse_entries(content: &str) -> Vec<RecoveryEntry> {
    let mut entries = Vec::new();
    let mut current: Option<RecoveryEntry> = None;
    let mut in_body = false;

    for line in content.lines() {
        if in_body {
            if line == "```" {
                in_body = false;
            } else if let Some(entry) = current.as_mut() {
                entry.body.push_str(line);
                entry.body.push('\n');
            }
            continue;
        }
        if let Some(header) = line.strip_prefix("## ") {
            entries.extend(current.take());
            current = parse_header(header);
            continue;
        }
        let Some(entry) = current.as_mut() else {
            continue;
        };
        if line == "---" {
            entries.extend(current.take());
        } else if line.starts_with("```") {
            in_body = true;
        } else if let Some((key, value)) = line.split_once(": ") {
            entry.fields.push((key.trim().to_string(), value.trim().to_string()));
        }
    }
    entries.extend(current);

    for entry in &mut entries {
        if entry.body.ends_with('\n') {
            entry.body.pop();
        }
    }
    entries
}

/// `<rfc3339> <category>: <description>`
fn parse_header(header: &str) -> Option<RecoveryEntry> {
    let (timestamp, rest) = header.split_once(' ')?;
    let (category, description) = rest.split_once(": ")?;
    Some(RecoveryEntry {
        timestamp: DateTime::parse_from_rfc3339(timestamp).ok()?.with_timezone(&Utc),
        category: category.parse().ok()?,
        description: description.to_string(),
        fields: Vec::new(),
        body: String::new(),
    })
}

// ---------------------------------------------------------------------------
// Pruning
// ---------------------------------------------------------------------------

/// Remove entries older than `before` (default: the prune age), or all of
/// them. Returns how many were removed.
pub fn prune_recovery(store_dir: &Path, before: Option<DateTime<Utc>>, all: bool) -> io::Result<usize> {
    let path = recovery_log_path(store_dir);
    if !path.exists() {
        return Ok(0);
    }

    let file = OpenOptions::new().read(true).write(true).open(&path)?;
    let mut locked = false;
    for _ in 0..10 {
        if try_lock(&file).is_ok() {
            locked = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    if !locked {
        return Err(io::Error::new(
            io::ErrorKind::WouldBlock,
            "recovery log is in use, try again later",
        ));
    }

    let content = std::fs::read_to_string(&path)?;
    let before_count = parse_entries(&content).len();
    let kept = if all {
        FILE_HEADER.to_string()
    } else {
        let cutoff = before.unwrap_or_else(|| Utc::now() - chrono::Duration::days(PRUNE_AGE_DAYS));
        retain_entries_since(&content, &cutoff)
    };
    let after_count = parse_entries(&kept).len();
    std::fs::write(&path, &kept)?;
    Ok(before_count - after_count)
}

/// Keep the header and every entry stamped at or after `cutoff`. Text is
/// copied verbatim.
fn retain_entries_since(content: &str, cutoff: &DateTime<Utc>) -> String {
    let mut out = String::new();
    let mut block = String::new();
    let mut keep_block = true;
    let mut in_body = false;

    for line in content.lines() {
        if !in_body && let Some(header) = line.strip_prefix("## ") {
            if keep_block {
                out.push_str(&block);
            }
            block.clear();
            keep_block = parse_header(header).is_some_and(|e| e.timestamp >= *cutoff);
        } else if line.starts_with("```") {
            in_body = !in_body;
        }
        block.push_str(line);
        block.push('\n');
    }
    if keep_block {
        out.push_str(&block);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn entry(category: RecoveryCategory, desc: &str, body: &str) -> RecoveryEntry {
        RecoveryEntry::new(category, desc)
            .field("Node", "4f2c")
            .body(body)
    }

    #[test]
    fn test_markdown_layout() {
        let mut e = entry(RecoveryCategory::Delete, "\"Deeds\" deleted", "{}");
        e.timestamp = Utc.with_ymd_and_hms(2026, 2, 10, 14, 32, 5).unwrap();
        assert_eq!(
            e.to_markdown(),
            "## 2026-02-10T14:32:05Z delete: \"Deeds\" deleted\n\nNode: 4f2c\n\n```json\n{}\n```\n\n---\n"
        );
    }

    #[test]
    fn test_log_and_read_newest_first() {
        let tmp = TempDir::new().unwrap();
        log_recovery(tmp.path(), entry(RecoveryCategory::Parser, "first", "[]"));
        log_recovery(tmp.path(), entry(RecoveryCategory::Write, "second", "{\n  \"a\": 1\n}"));

        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].description, "second");
        assert_eq!(entries[0].category, RecoveryCategory::Write);
        assert_eq!(entries[0].body, "{\n  \"a\": 1\n}");
        assert_eq!(entries[1].fields, vec![("Node".to_string(), "4f2c".to_string())]);

        let content = std::fs::read_to_string(recovery_log_path(tmp.path())).unwrap();
        assert!(content.starts_with("<!-- qc recovery log"));
        assert_eq!(read_recovery_entries(tmp.path(), Some(1)).len(), 1);
    }

    #[test]
    fn test_body_lines_that_look_like_headers() {
        let tmp = TempDir::new().unwrap();
        log_recovery(tmp.path(), entry(RecoveryCategory::Delete, "d", "## not a header\n---"));
        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].body, "## not a header\n---");
    }

    #[test]
    fn test_prune_before_cutoff() {
        let tmp = TempDir::new().unwrap();
        let mut old = entry(RecoveryCategory::Import, "old", "");
        old.timestamp = Utc::now() - chrono::Duration::days(45);
        log_recovery(tmp.path(), old);
        log_recovery(tmp.path(), entry(RecoveryCategory::Import, "new", ""));

        assert_eq!(prune_recovery(tmp.path(), None, false).unwrap(), 1);
        let entries = read_recovery_entries(tmp.path(), None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "new");
    }

    #[test]
    fn test_prune_all_keeps_header() {
        let tmp = TempDir::new().unwrap();
        log_recovery(tmp.path(), entry(RecoveryCategory::Parser, "x", ""));
        assert_eq!(prune_recovery(tmp.path(), None, true).unwrap(), 1);
        assert!(read_recovery_entries(tmp.path(), None).is_empty());
        let content = std::fs::read_to_string(recovery_log_path(tmp.path())).unwrap();
        assert_eq!(content, FILE_HEADER);
    }

    #[test]
    fn test_prune_without_log() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(prune_recovery(tmp.path(), None, false).unwrap(), 0);
    }

    #[test]
    fn test_header_parsing() {
        let parsed = parse_header("2026-02-10T14:32:05Z write: store could not be saved").unwrap();
        assert_eq!(parsed.category, RecoveryCategory::Write);
        assert_eq!(parsed.description, "store could not be saved");
        assert!(parse_header("2026-02-10T14:32:05Z conflict: x").is_none());
        assert!(parse_header("yesterday parser: x").is_none());
    }

    #[test]
    fn test_to_json() {
        let json = entry(RecoveryCategory::Parser, "skipped", "[]").to_json();
        assert_eq!(json["category"], "parser");
        assert_eq!(json["fields"]["Node"], "4f2c");
        assert_eq!(json["body"], "[]");
    }
}
